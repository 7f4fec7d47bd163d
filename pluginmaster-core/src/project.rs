use crate::manifest::{Manifest, PUBLISHED_KEYS};

/// Trims a manifest to the published key set, in published order. Absent keys stay absent.
pub fn project(manifest: &Manifest) -> Manifest {
    let mut trimmed = Manifest::new();
    for key in PUBLISHED_KEYS {
        if let Some(value) = manifest.get(key) {
            trimmed.set(key, value.clone());
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_unpublished_keys_and_orders_published_ones() {
        let raw = Manifest::from_json_str(
            r#"{"RepoUrl":"https://example.com/Foo","Internal":"x","IsHide":true,"InternalName":"Foo","Author":"me","_Build":1}"#,
        )
        .unwrap();
        let trimmed = project(&raw);
        let keys: Vec<&str> = trimmed.keys().collect();
        assert_eq!(keys, vec!["Author", "InternalName", "RepoUrl", "IsHide"]);
    }

    #[test]
    fn drops_author_written_derived_keys() {
        let raw = Manifest::from_json_str(
            r#"{"InternalName":"Foo","DownloadLinkInstall":"a","DownloadLinkTesting":"b","DownloadLinkUpdate":"c","DownloadCount":9,"LastUpdate":"1","LastUpdated":"2","IsTestingExclusive":true}"#,
        )
        .unwrap();
        let projected = project(&raw);
        let keys: Vec<&str> = projected.keys().collect();
        assert_eq!(keys, vec!["InternalName", "IsTestingExclusive"]);
    }

    #[test]
    fn keeps_values_verbatim() {
        let raw = Manifest::from_json_str(
            r#"{"InternalName":"Foo","Tags":["a","b"],"DalamudApiLevel":9,"Description":null}"#,
        )
        .unwrap();
        let trimmed = project(&raw);
        assert_eq!(trimmed.get("Tags"), raw.get("Tags"));
        assert_eq!(trimmed.get("DalamudApiLevel"), Some(&serde_json::json!(9)));
        assert_eq!(trimmed.get("Description"), Some(&serde_json::Value::Null));
        assert!(!trimmed.contains("Punchline"));
    }
}
