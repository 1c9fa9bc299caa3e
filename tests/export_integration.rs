//! Export runs: labels listed in a results CSV, one per distinct active.

mod support;

use std::path::Path;
use std::time::Duration;

use harvester_core::download::RetryPolicy;
use harvester_core::pipeline::{ExportSummary, Pipeline, PipelineConfig, PipelineError};
use harvester_core::portal::PortalConfig;
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXPORT: &str = "\
No,Name,Actives
51234,Weed Away,GLYPHOSATE 360 g/L
51235,Weed Away Plus,GLYPHOSATE 360 g/L
60001,Bug Stop, BIFENTHRIN 100 g/L
60002,Missing Label,IMIDACLOPRID 200 g/L
,Orphan Row,PARAQUAT 250 g/L
";

fn pipeline(server: &MockServer, store_dir: &Path) -> Pipeline {
    let base = Url::parse(&format!("{}/", server.uri())).expect("valid base");
    let search = base.join("pubcris").expect("valid search url");
    let elabels = base.join("elabels/").expect("valid elabel base");
    let mut config = PipelineConfig::new(store_dir, PortalConfig::new(base, search), elabels);
    config.rate_limit = Duration::ZERO;
    Pipeline::new(config)
        .expect("valid config")
        .with_retry_policy(RetryPolicy::no_retry())
}

async fn mount_label(server: &MockServer, number: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/elabels/{number}ELBL.pdf")))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(format!("%PDF {number}").into_bytes()))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_export_fetches_one_label_per_distinct_active() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_label(&server, "51234", 200).await;
    mount_label(&server, "60001", 200).await;
    mount_label(&server, "60002", 404).await;
    Mock::given(method("GET"))
        .and(path("/elabels/51235ELBL.pdf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("failed to create temp dir");
    let csv = temp.path().join("export.csv");
    std::fs::write(&csv, EXPORT).expect("write export");
    let store_dir = temp.path().join("labels");

    let summary = pipeline(&server, &store_dir)
        .run_export(&csv)
        .await
        .expect("export run succeeds");

    assert_eq!(
        summary,
        ExportSummary {
            listed: 4,
            unique: 3,
            downloaded: 2,
            already_present: 0,
            skipped_not_found: 1,
            failed: 0,
        }
    );
    assert!(store_dir.join("51234ELBL.pdf").exists());
    assert!(store_dir.join("60001ELBL.pdf").exists());
    assert!(!store_dir.join("60002ELBL.pdf").exists());
}

#[tokio::test]
async fn test_export_skips_labels_already_in_store() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("failed to create temp dir");
    let csv = temp.path().join("export.csv");
    std::fs::write(&csv, "No,Actives\n51234,GLYPHOSATE\n").expect("write export");
    let store_dir = temp.path().join("labels");
    std::fs::create_dir_all(&store_dir).expect("create store");
    std::fs::write(store_dir.join("51234ELBL.pdf"), b"%PDF kept").expect("seed label");

    let summary = pipeline(&server, &store_dir)
        .run_export(&csv)
        .await
        .expect("export run succeeds");

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.already_present, 1);
    assert_eq!(
        std::fs::read(store_dir.join("51234ELBL.pdf")).expect("label readable"),
        b"%PDF kept"
    );
}

#[tokio::test]
async fn test_export_without_actives_column_is_fatal() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp = TempDir::new().expect("failed to create temp dir");
    let csv = temp.path().join("export.csv");
    std::fs::write(&csv, "No,Name\n51234,Weed Away\n").expect("write export");

    let err = pipeline(&server, temp.path())
        .run_export(&csv)
        .await
        .expect_err("export run aborts");
    assert!(matches!(err, PipelineError::Export(_)));
}
