//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use mockito::Matcher;
use nutrition_acquire::config::AcquisitionConfig;
use serde_json::json;

pub const DATASTORE_PATH: &str = "/api/3/action/datastore_search";
pub const RESOURCE_ID: &str = "res-test";

/// A configuration that fails fast: no retries, short timeout, offline
/// defaults for every source.
pub fn fast_config() -> AcquisitionConfig {
    AcquisitionConfig::offline()
        .with_max_retries(0)
        .with_retry_base_delay(Duration::ZERO)
        .with_timeout(Duration::from_secs(5))
        .with_resource_id(RESOURCE_ID)
}

/// Query matcher for one datastore page.
pub fn page_query(offset: usize, limit: usize) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("resource_id".into(), RESOURCE_ID.into()),
        Matcher::UrlEncoded("limit".into(), limit.to_string()),
        Matcher::UrlEncoded("offset".into(), offset.to_string()),
    ])
}

/// A successful datastore body with records `ids` and an optional total.
pub fn page_body(ids: std::ops::Range<usize>, total: Option<usize>) -> String {
    let records: Vec<_> = ids
        .map(|id| {
            json!({
                "_id": id,
                "LOCALIDAD": "KENNEDY",
                "EDAD_MESES": id % 60,
                "PESO_KG": 10.5,
            })
        })
        .collect();
    let mut result = json!({ "records": records });
    if let Some(total) = total {
        result["total"] = json!(total);
    }
    json!({ "success": true, "result": result }).to_string()
}

pub const SAMPLE_CSV: &str = "LOCALIDAD,EDAD_MESES,PESO_KG\nSUBA,12,9.5\nBOSA,30,13.1\nUSME,48,16.0\n";
