use std::error::Error;
use std::sync::Arc;

use assetflow::errors::StageError;
use assetflow::fs::MockFileSystem;
use assetflow::pipeline::{js, FileSet, Pipeline, SourceFile, SourceMap};
use assetflow::types::{AssetClass, StageKind};
use assetflow_test_utils::{init_tracing, stage_context, CollectingSink};

type TestResult = Result<(), Box<dyn Error>>;

fn script(name: &str, text: &str) -> SourceFile {
    SourceFile::from_source(name, format!("src/js/{name}"), text)
}

fn pipeline(kinds: &[StageKind], sink: &Arc<CollectingSink>) -> Pipeline {
    let ctx = stage_context(
        AssetClass::Scripts,
        Arc::new(MockFileSystem::new()),
        Arc::clone(sink) as _,
    );
    Pipeline::for_kinds(kinds, &ctx)
}

#[test]
fn validate_reports_unbalanced_brackets_with_line() {
    let err = js::validate("function f() {\n  return 1;\n").unwrap_err();
    assert_eq!(err.line, 1);
    assert_eq!(err.message, "unclosed '{'");

    let err = js::validate("var a = 1;\nfoo(a));\n").unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.message, "unexpected ')'");

    let boxed: Box<dyn Error> = Box::new(err);
    assert_eq!(boxed.to_string(), "line 2: unexpected ')'");
}

#[test]
fn validate_reports_unterminated_literals() {
    let err = js::validate("var s = 'abc\nvar t = 1;").unwrap_err();
    assert_eq!(err.message, "unterminated string literal");
    assert_eq!(err.line, 1);

    let err = js::validate("var a = 1;\n/* open").unwrap_err();
    assert_eq!(err.message, "unterminated comment");
    assert_eq!(err.line, 2);

    let err = js::validate("var t = `abc").unwrap_err();
    assert_eq!(err.message, "unterminated template literal");
}

#[test]
fn validate_accepts_regex_division_and_templates() -> TestResult {
    js::validate("var r = /[)}]+/g;\nvar half = total / 2 / 1;\nvar t = `${a + (b)}`;\n")?;
    Ok(())
}

#[test]
fn validate_reads_slash_after_a_statement_head_as_regex() -> TestResult {
    js::validate("if (ok) /'/.test(s);\nwhile (i--) /a\\/b/.exec(x);\n")?;
    js::validate("for (;;) /[(]/g.test(s);\n")?;
    // A call's closing paren still ends an expression.
    js::validate("var q = f(a) / g(b) / 2;\nvar r = (a + b) / 'c'.length;\n")?;
    Ok(())
}

#[test]
fn lint_flags_debugger_loose_equality_and_alert() {
    let src = "debugger;\nif (a == b) alert('x');\nwindow.alert('y');\nfoo.alert('z');\nif (c != d) {}\n";
    let found: Vec<(usize, &str)> = js::lint(src).iter().map(|f| (f.line, f.rule)).collect();
    assert_eq!(
        found,
        vec![
            (1, "no-debugger"),
            (2, "eqeqeq"),
            (2, "no-alert"),
            (3, "no-alert"),
            (5, "eqeqeq"),
        ]
    );

    let messages: Vec<String> = js::lint("x != y").into_iter().map(|f| f.message).collect();
    assert_eq!(messages, vec!["Expected '!==' and instead saw '!='.".to_string()]);
}

#[test]
fn lint_ignores_words_inside_strings_and_comments() {
    let src = "var s = 'debugger';\n// alert('x')\nvar ok = a === b;\n";
    assert!(js::lint(src).is_empty());
}

#[test]
fn minify_drops_comments_and_keeps_asi_line_breaks() -> TestResult {
    let src = "var a = 1;\n// comment\nvar b = a\n+ 1;\nfoo(\n  a\n)\n";
    let out = js::minify(src)?;
    assert_eq!(out.code, "var a=1;var b=a\n+1;foo(a)");

    let out = js::minify("function f() {\n  return\n  x\n}\n")?;
    assert_eq!(out.code, "function f(){return\nx}");
    Ok(())
}

#[test]
fn minify_keeps_tokens_apart_that_would_merge() -> TestResult {
    assert_eq!(js::minify("a++ + b")?.code, "a++ +b");
    assert_eq!(js::minify("x - -y")?.code, "x- -y");
    assert_eq!(js::minify("typeof  value")?.code, "typeof value");
    Ok(())
}

#[test]
fn minify_keeps_license_comments_on_their_own_line() -> TestResult {
    let out = js::minify("/*! keep me */\nvar x = 1; /* drop */\n")?;
    assert_eq!(out.code, "/*! keep me */\nvar x=1;");
    Ok(())
}

#[test]
fn minify_positions_point_back_into_the_input() -> TestResult {
    let out = js::minify("var a;\n\n  b();\n")?;
    // "var a;b();" with `b` at output column 6, input line 2 column 2.
    assert!(out.positions.contains(&(0, 6, 2, 2)));
    Ok(())
}

#[test]
fn concat_joins_in_input_order_and_lint_maps_lines_back() -> TestResult {
    init_tracing();
    let sink = Arc::new(CollectingSink::new());
    let files = FileSet::new(vec![
        script("vendor.js", "var v = 1;"),
        script("app.js", "var a = 2;\ndebugger;"),
    ]);

    let out = pipeline(&[StageKind::Concat, StageKind::Lint], &sink).run(files)?;
    assert_eq!(out.len(), 1);
    let joined = out.find("scripts.js").ok_or("missing scripts.js")?;
    assert_eq!(joined.text()?, "var v = 1;\nvar a = 2;\ndebugger;");

    let diags = sink.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].file, "src/js/app.js");
    assert_eq!(diags[0].line, 2);
    assert_eq!(diags[0].rule, "no-debugger");
    Ok(())
}

#[test]
fn compile_error_names_the_original_file_and_line() {
    let sink = Arc::new(CollectingSink::new());
    let files = FileSet::new(vec![
        script("vendor.js", "var v = 1;\nvar w = 2;"),
        script("app.js", "function f() {\n  return 1;"),
    ]);

    let err = pipeline(&[StageKind::Concat, StageKind::Compile], &sink)
        .run(files)
        .unwrap_err();
    assert_eq!(
        err,
        StageError::Compile {
            file: "src/js/app.js".to_string(),
            line: 1,
            message: "unclosed '{'".to_string(),
        }
    );
}

#[test]
fn lint_violations_never_stop_the_pipeline() -> TestResult {
    let sink = Arc::new(CollectingSink::new());
    let files = FileSet::new(vec![script("app.js", "if (a == b) { debugger; }  \n")]);

    let out = pipeline(&AssetClass::Scripts.default_stages(), &sink).run(files)?;

    assert_eq!(sink.rules(), vec!["eqeqeq", "no-debugger", "no-trailing-spaces"]);
    let names: Vec<String> = out.files().iter().map(|f| f.file_name()).collect();
    assert_eq!(names, vec!["scripts.min.js", "scripts.min.js.map"]);
    Ok(())
}

#[test]
fn full_scripts_pipeline_writes_banner_and_linked_map() -> TestResult {
    let sink = Arc::new(CollectingSink::new());
    let files = FileSet::new(vec![
        script("plugin.js", "// plugin\nvar p = 1;\n"),
        script("app.js", "var a = p + 1;\n"),
    ]);

    let out = pipeline(&AssetClass::Scripts.default_stages(), &sink).run(files)?;

    let code = out.find("scripts.min.js").ok_or("missing output")?.text()?;
    assert!(code.starts_with("/*!\n * site\n"), "{code}");
    assert!(code.contains("Copyright 2024. MIT licensed."));
    assert!(code.contains("var p=1;"));
    assert!(code.ends_with("//# sourceMappingURL=scripts.min.js.map"), "{code}");

    let map_file = out.find("scripts.min.js.map").ok_or("missing map")?;
    let json: serde_json::Value = serde_json::from_str(map_file.text()?)?;
    assert_eq!(json["version"], 3);
    assert_eq!(json["file"], "scripts.min.js");

    let map = SourceMap::from_json("/", map_file.text()?)?;
    assert_eq!(map.get_sources(), &vec!["src/js/plugin.js", "src/js/app.js"]);

    let mappings = map.get_mappings();
    let banner_lines = 8;
    assert!(mappings.iter().all(|m| m.generated_line >= banner_lines));
    let originals: Vec<(u32, u32)> = mappings
        .iter()
        .filter_map(|m| m.original.map(|o| (o.source, o.original_line)))
        .collect();
    // `var` of plugin.js sits on its second line.
    assert_eq!(originals[0], (0, 1));
    assert!(originals.contains(&(1, 0)));
    Ok(())
}
