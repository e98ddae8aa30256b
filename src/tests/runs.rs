use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::{Value, json};

use crate::Error;
use crate::driver::{Driver, MemoryDriver, MemoryDriverFactory, MemoryElement, Rect};
use crate::hooks::HookRegistry;
use crate::plugins::builtin_hooks;
use crate::report::{Report, ReportSummary};
use crate::runner::Runner;
use crate::settings::Settings;
use crate::spec::TestSpec;

fn spec(value: Value) -> TestSpec {
    TestSpec::from_value(value, &HookRegistry::default()).unwrap()
}

async fn execute(settings: Settings, drivers: Arc<MemoryDriverFactory>, spec: &TestSpec) -> ReportSummary {
    let hooks = builtin_hooks(&settings);
    Runner::new(settings, hooks, drivers)
        .unwrap()
        .execute(spec)
        .await
        .unwrap()
}

fn login_page(target: &str) -> MemoryDriver {
    MemoryDriver::new(target)
        .with_element("//h1", MemoryElement::new().text("Sign in to Acme"))
        .with_element("//input[@name='user']", MemoryElement::new())
        .with_element(
            "//button[@type='submit']",
            MemoryElement::new().href("https://acme.test/dashboard"),
        )
}

#[tokio::test]
async fn test_single_url_validation() {
    let spec = spec(json!({
        "targetBrowsers": ["Chrome"],
        "path": "http://example.com",
        "steps": [
            {"action": "Validate", "type": "URL", "state": "Equals", "target": "http://example.com"}
        ]
    }));
    let drivers = Arc::new(MemoryDriverFactory::new(MemoryDriver::new));
    let summary = execute(Settings::default(), drivers, &spec).await;
    assert_eq!(summary.successes(), 1);
    assert_eq!(summary.fails(), 0);
    assert_eq!(summary.critical_failures(), 0);
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_outputs_feed_later_steps() {
    let spec = spec(json!({
        "targetBrowsers": ["Firefox", "Chrome"],
        "path": "https://acme.test/${{ Definitions.pages.login }}",
        "definitions": {
            "pages": {"login": "login"},
            "UserField": "//input[@name='user']"
        },
        "steps": [
            {"action": "OutputValue", "target": "//h1", "parameters": {"source": "XPathText", "outputName": "heading"}},
            {"action": "SendKeys", "target": "${{ Definitions.UserField }}", "parameters": {"data": "${{ Validation.heading }}"}},
            {"action": "Validate", "type": "XPath", "state": "PropertyHasValue", "target": "${{ Definitions.UserField }}",
             "parameters": {"name": "value", "value": "Sign in to Acme"}},
            {"action": "Click", "target": "//button[@type='submit']"},
            {"action": "Validate", "type": "URL", "state": "Contains", "target": "/dashboard"}
        ]
    }));
    let drivers = Arc::new(MemoryDriverFactory::new(login_page));
    let summary = execute(Settings::default(), drivers.clone(), &spec).await;
    assert_eq!(summary.total(), 4);
    assert_eq!(summary.successes(), 4, "{:?}", summary.reports());
    assert_eq!(summary.outputs, json!({"heading": "Sign in to Acme"}));

    let firefox = drivers.driver("Firefox").unwrap();
    assert_eq!(firefox.events()[0], "navigate https://acme.test/login");
    assert!(firefox.is_quit());

    // reports keep the locator as written
    let validation = summary.by_validation_type("XPath").reports()[0].clone();
    assert_eq!(
        validation.validation().unwrap().target,
        "${{ Definitions.UserField }}"
    );
}

#[tokio::test]
async fn test_failures_abort_only_their_target() {
    let spec = spec(json!({
        "targetBrowsers": ["Firefox", "Chrome"],
        "path": "https://acme.test/login",
        "steps": [
            {"action": "Validate", "type": "XPath", "state": "Exists", "target": "//h1"},
            {"action": "Click", "target": "//a[@id='${{ Validation.missing }}']"},
            {"action": "Validate", "type": "XPath", "state": "Visible", "target": "//h1"}
        ]
    }));
    let drivers = Arc::new(MemoryDriverFactory::new(login_page));
    let summary = execute(Settings::default(), drivers, &spec).await;
    assert_eq!(summary.total(), 4);
    assert_eq!(summary.successes(), 2);
    assert_eq!(summary.critical_failures(), 2);
    assert_eq!(summary.exit_code(), 1);
    for target in ["Firefox", "Chrome"] {
        let reports = summary.by_target(target);
        assert_eq!(reports.total(), 2);
        match &reports.reports()[1] {
            Report::StepFailure(failure) => {
                assert_eq!(failure.step_index, 1);
                assert_eq!(failure.msg, "'Validation.missing' does not exist");
            }
            other => panic!("unexpected report {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_failed_assertions_do_not_abort() {
    let spec = spec(json!({
        "targetBrowsers": ["Edge"],
        "path": "https://acme.test/login",
        "steps": [
            {"action": "Validate", "type": "XPath", "state": "TextMatches", "target": "//h1", "parameters": {"pattern": "^Welcome"}},
            {"action": "Validate", "type": "URL", "state": "NotContains", "target": "login"},
            {"action": "Validate", "type": "XPath", "state": "Exists", "target": "//h1"}
        ]
    }));
    let drivers = Arc::new(MemoryDriverFactory::new(login_page));
    let summary = execute(Settings::default(), drivers, &spec).await;
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.fails(), 2);
    assert_eq!(summary.critical_failures(), 0);
    assert_eq!(
        summary.by_validation_type("URL").reports()[0].msg(),
        "Expected URL: \"login\", Received URL \"https://acme.test/login\""
    );
}

#[tokio::test]
async fn test_debug_mode_propagates_and_keeps_targets_open() {
    let spec = spec(json!({
        "targetBrowsers": ["Chrome"],
        "path": "https://acme.test/login",
        "steps": [{"action": "Click", "target": "//nope"}]
    }));
    let drivers = Arc::new(MemoryDriverFactory::new(login_page));
    let settings = Settings {
        debug: true,
        ..Default::default()
    };
    let runner = Runner::new(settings, HookRegistry::default(), drivers.clone()).unwrap();
    let err = runner.execute(&spec).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ElementNotFound(_))));
    assert!(!drivers.driver("Chrome").unwrap().is_quit());
}

#[tokio::test]
async fn test_spec_errors_abort_before_any_target_opens() {
    let spec = spec(json!({
        "targetBrowsers": ["Chrome"],
        "path": "https://acme.test",
        "steps": [
            {"action": "Refresh"},
            {"action": "OutputValue", "target": "//h1", "parameters": {"source": "XPathText"}}
        ]
    }));
    let drivers = Arc::new(MemoryDriverFactory::new(login_page));
    let runner = Runner::new(Settings::default(), HookRegistry::default(), drivers.clone()).unwrap();
    let err = runner.execute(&spec).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidSpec(_))));
    assert!(err.to_string().starts_with("step 1:"));
    assert!(drivers.opened().is_empty());
}

#[tokio::test]
async fn test_outputs_only_published_for_output_target() {
    let spec = spec(json!({
        "targetBrowsers": ["Firefox", "Chrome"],
        "path": "https://acme.test",
        "steps": [
            {"action": "OutputValue", "target": "${{ Environment.PLUME_TEST_RUNS_NAME }}", "parameters": {"source": "Literal", "outputName": "user.name"}}
        ]
    }));
    unsafe {
        std::env::set_var("PLUME_TEST_RUNS_NAME", "ada");
    }
    let settings = Settings {
        output_target: Some("chrome".to_string()),
        ..Default::default()
    };
    let drivers = Arc::new(MemoryDriverFactory::new(login_page));
    let summary = execute(settings, drivers, &spec).await;
    assert_eq!(summary.total(), 0);
    assert_eq!(summary.outputs, json!({"user": {"name": "ada"}}));
}

fn png(color: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba(color)));
    let mut buf = Cursor::new(vec![]);
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[tokio::test]
async fn test_visual_parity_with_local_storage() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = spec(json!({
        "targetBrowsers": ["Chrome"],
        "path": "https://acme.test",
        "steps": [
            {"action": "Validate", "type": "XPath", "state": "VisualParity", "target": "//main",
             "parameters": {"baselineID": "main-content"}}
        ]
    }));
    let page = |color: [u8; 4]| {
        Arc::new(MemoryDriverFactory::new(move |target| {
            MemoryDriver::new(target).with_element(
                "//main",
                MemoryElement::new()
                    .rect(Rect::new(0.0, 0.0, 4.0, 4.0))
                    .screenshot(png(color)),
            )
        }))
    };
    let settings = |run_id: &str| Settings {
        run_id: run_id.to_string(),
        image_dir: Some(tmp.path().to_path_buf()),
        ..Default::default()
    };

    let first = execute(settings("run-1"), page([255; 4]), &spec).await;
    assert_eq!(first.fails(), 1);
    assert_eq!(first.reports()[0].msg(), "No baseline image found");

    let created = execute(
        Settings {
            create_baseline_if_absent: true,
            ..settings("run-2")
        },
        page([255; 4]),
        &spec,
    )
    .await;
    assert_eq!(created.successes(), 1);
    assert!(tmp.path().join("baselines/main-content.png").exists());

    let same = execute(settings("run-3"), page([255; 4]), &spec).await;
    assert_eq!(same.successes(), 1);

    let changed = execute(settings("run-4"), page([0, 0, 0, 255]), &spec).await;
    assert_eq!(changed.fails(), 1);
    let Report::VisualParity(report) = &changed.reports()[0] else {
        panic!("expected a visual parity report");
    };
    assert!(report.treatment_image_uri.as_deref().unwrap().ends_with("runs/run-4/main-content_treatment.png"));
    assert!(report.delta_image_uri.as_deref().unwrap().ends_with("runs/run-4/main-content_delta.png"));
    assert!(report.baseline_image_uri.as_deref().unwrap().ends_with("snapshots/main-content_run-4.png"));

    // the document written for the failing run survives a round trip
    let document = changed.to_json(false).unwrap();
    assert_eq!(ReportSummary::from_json(&document).unwrap(), changed);
}

#[tokio::test]
async fn test_corrupt_baseline_is_a_critical_failure() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("baselines")).unwrap();
    std::fs::write(tmp.path().join("baselines/main-content.png"), b"not a png").unwrap();
    let spec = spec(json!({
        "targetBrowsers": ["Chrome"],
        "path": "https://acme.test",
        "steps": [
            {"action": "Validate", "type": "XPath", "state": "VisualParity", "target": "//main",
             "parameters": {"baselineID": "main-content"}},
            {"action": "Validate", "type": "URL", "state": "Contains", "target": "acme"}
        ]
    }));
    let drivers = Arc::new(MemoryDriverFactory::new(|target| {
        MemoryDriver::new(target).with_element(
            "//main",
            MemoryElement::new()
                .rect(Rect::new(0.0, 0.0, 4.0, 4.0))
                .screenshot(png([255; 4])),
        )
    }));
    let settings = Settings {
        run_id: "run-1".to_string(),
        image_dir: Some(tmp.path().to_path_buf()),
        ..Default::default()
    };
    let summary = execute(settings, drivers, &spec).await;
    assert_eq!(summary.total(), 1);
    assert_eq!(summary.critical_failures(), 1);
    let Report::StepFailure(report) = &summary.reports()[0] else {
        panic!("expected a step failure report");
    };
    assert_eq!(report.step_index, 0);
}

#[tokio::test]
async fn test_driver_name_is_the_target_name() {
    let spec = spec(json!({
        "targetBrowsers": ["Firefox"],
        "path": "https://acme.test",
        "steps": [{"action": "SetBrowserSize", "parameters": {"width": 800, "height": 600}}]
    }));
    let drivers = Arc::new(MemoryDriverFactory::new(login_page));
    execute(Settings::default(), drivers.clone(), &spec).await;
    let firefox = drivers.driver("Firefox").unwrap();
    assert_eq!(firefox.name(), "Firefox");
    assert_eq!(firefox.window_size(), Some((800, 600)));
}
