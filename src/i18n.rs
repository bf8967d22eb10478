use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use moka::future::Cache;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const BUNDLE_CACHE_CAPACITY: u64 = 1_000;
const BUNDLE_TTL: Duration = Duration::from_secs(3_600);

type BundleKey = (String, String);

/// Per-file outcome of checking a locale directory.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LocaleValidation {
    pub locale: String,
    pub valid: bool,
    pub files_checked: usize,
    /// File name to parse error
    pub errors: BTreeMap<String, String>,
}

/// JSON translation bundles stored as `{root}/{locale}/{namespace}.json`.
pub struct LocaleStore {
    root: PathBuf,
    default_locale: String,
    cache: Cache<BundleKey, Arc<Value>>,
}

/// Locale and namespace names: `[A-Za-z0-9_-]+`.
pub fn check_segment<'a>(field: &str, segment: &'a str) -> AppResult<&'a str> {
    let ok = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(segment)
    } else {
        Err(AppError::invalid(field, "may only contain letters, digits, '_' and '-'"))
    }
}

/// Dotted paths of every leaf under `value`.
pub fn flatten_keys(value: &Value) -> BTreeSet<String> {
    fn walk(prefix: &str, value: &Value, out: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(&path, child, out);
                }
            }
            _ if !prefix.is_empty() => {
                out.insert(prefix.to_string());
            }
            _ => {}
        }
    }

    let mut out = BTreeSet::new();
    walk("", value, &mut out);
    out
}

fn io_error(context: &str, e: std::io::Error) -> AppError {
    AppError::internal(format!("{context}: {e}"))
}

fn read_bundle(path: &Path) -> AppResult<Value> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::not_found("Locale namespace not found"));
        }
        Err(e) => return Err(io_error("Failed to read locale file", e)),
    };
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| AppError::internal(format!("Invalid locale file {}: {e}", path.display())))?;
    if !value.is_object() {
        return Err(AppError::internal(format!(
            "Locale file {} is not a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

/// Sorted names of entries in `dir` accepted by `pick`.
fn list_dir(dir: &Path, pick: impl Fn(&fs::DirEntry) -> Option<String>) -> AppResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error("Failed to list locales", e)),
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| pick(&entry))
        .filter(|name| check_segment("name", name).is_ok())
        .collect();
    names.sort();
    Ok(names)
}

fn locale_dirs(root: &Path) -> AppResult<Vec<String>> {
    list_dir(root, |entry| {
        entry
            .file_type()
            .ok()
            .filter(|t| t.is_dir())
            .and_then(|_| entry.file_name().into_string().ok())
    })
}

fn namespace_files(dir: &Path) -> AppResult<Vec<String>> {
    list_dir(dir, |entry| {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return None;
        }
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
    })
}

fn validate_dir(dir: &Path, locale: String) -> AppResult<LocaleValidation> {
    let mut errors = BTreeMap::new();
    let namespaces = namespace_files(dir)?;
    for ns in &namespaces {
        let file = format!("{ns}.json");
        if let Err(e) = read_bundle(&dir.join(&file)) {
            errors.insert(file, e.to_string());
        }
    }
    Ok(LocaleValidation {
        locale,
        valid: errors.is_empty(),
        files_checked: namespaces.len(),
        errors,
    })
}

/// Writes next to the target and renames over it, so readers never see a
/// half-written file.
fn write_atomic(dir: &Path, file: &str, value: &Value) -> AppResult<()> {
    fs::create_dir_all(dir).map_err(|e| io_error("Failed to create locale directory", e))?;
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| AppError::internal(format!("Failed to encode locale: {e}")))?;

    let tmp = dir.join(format!(".{file}.{}.tmp", Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp, body) {
        return Err(io_error("Failed to write locale file", e));
    }
    if let Err(e) = fs::rename(&tmp, dir.join(file)) {
        let _ = fs::remove_file(&tmp);
        return Err(io_error("Failed to replace locale file", e));
    }
    Ok(())
}

impl LocaleStore {
    pub fn new(root: impl Into<PathBuf>, default_locale: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            default_locale: default_locale.into(),
            cache: Cache::builder()
                .max_capacity(BUNDLE_CACHE_CAPACITY)
                .time_to_live(BUNDLE_TTL)
                .build(),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    fn locale_dir(&self, locale: &str) -> AppResult<PathBuf> {
        Ok(self.root.join(check_segment("locale", locale)?))
    }

    async fn existing_locale_dir(&self, locale: &str) -> AppResult<PathBuf> {
        let dir = self.locale_dir(locale)?;
        let probe = dir.clone();
        if web::block(move || probe.is_dir()).await? {
            Ok(dir)
        } else {
            Err(AppError::not_found(format!("Locale '{locale}' not found")))
        }
    }

    pub async fn locales(&self) -> AppResult<Vec<String>> {
        let root = self.root.clone();
        web::block(move || locale_dirs(&root)).await?
    }

    pub async fn namespaces(&self, locale: &str) -> AppResult<Vec<String>> {
        let dir = self.existing_locale_dir(locale).await?;
        web::block(move || namespace_files(&dir)).await?
    }

    /// One namespace of a locale, served from cache after the first read.
    pub async fn bundle(&self, locale: &str, namespace: &str) -> AppResult<Arc<Value>> {
        let dir = self.locale_dir(locale)?;
        let file = format!("{}.json", check_segment("namespace", namespace)?);
        let key = (locale.to_string(), namespace.to_string());

        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let value = Arc::new(web::block(move || read_bundle(&dir.join(file))).await??);
        self.cache.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Every namespace of a locale keyed by namespace name.
    pub async fn all(&self, locale: &str) -> AppResult<Map<String, Value>> {
        let mut merged = Map::new();
        for ns in self.namespaces(locale).await? {
            let bundle = self.bundle(locale, &ns).await?;
            merged.insert(ns, bundle.as_ref().clone());
        }
        Ok(merged)
    }

    /// Keys present in the default locale but absent from `locale`, per
    /// namespace. Namespaces with nothing missing are left out.
    pub async fn missing_keys(&self, locale: &str) -> AppResult<BTreeMap<String, Vec<String>>> {
        self.existing_locale_dir(locale).await?;
        let reference = self.all(&self.default_locale).await?;
        let target = self.all(locale).await?;

        let mut missing = BTreeMap::new();
        for (ns, bundle) in &reference {
            let have = target.get(ns).map(flatten_keys).unwrap_or_default();
            let gaps: Vec<String> = flatten_keys(bundle).difference(&have).cloned().collect();
            if !gaps.is_empty() {
                missing.insert(ns.clone(), gaps);
            }
        }
        Ok(missing)
    }

    /// Parses every file of a locale without touching the cache.
    pub async fn validate(&self, locale: &str) -> AppResult<LocaleValidation> {
        let dir = self.existing_locale_dir(locale).await?;
        let locale = locale.to_string();
        web::block(move || validate_dir(&dir, locale)).await?
    }

    /// Replaces a namespace file and drops its cached copy.
    pub async fn write(&self, locale: &str, namespace: &str, value: Value) -> AppResult<()> {
        if !value.is_object() {
            return Err(AppError::invalid("body", "must be a JSON object"));
        }
        let dir = self.locale_dir(locale)?;
        let file = format!("{}.json", check_segment("namespace", namespace)?);

        web::block(move || write_atomic(&dir, &file, &value)).await??;
        self.cache
            .invalidate(&(locale.to_string(), namespace.to_string()))
            .await;

        info!(locale, namespace, "Locale namespace updated");
        Ok(())
    }

    /// Loads every bundle of every locale so bad files show up at startup.
    pub async fn warmup(&self) -> AppResult<usize> {
        let mut loaded = 0;
        for locale in self.locales().await? {
            for ns in self.namespaces(&locale).await? {
                match self.bundle(&locale, &ns).await {
                    Ok(_) => loaded += 1,
                    Err(e) => warn!(locale = %locale, namespace = %ns, error = %e, "Skipping locale bundle"),
                }
            }
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn seed() -> (TempDir, LocaleStore) {
        let dir = tempfile::tempdir().unwrap();
        let en = dir.path().join("en");
        let ar = dir.path().join("ar");
        fs::create_dir_all(&en).unwrap();
        fs::create_dir_all(&ar).unwrap();
        fs::write(
            en.join("common.json"),
            r#"{"app": {"name": "ERP", "welcome": "Welcome"}, "save": "Save"}"#,
        )
        .unwrap();
        fs::write(en.join("rental.json"), r#"{"title": "Rentals"}"#).unwrap();
        fs::write(ar.join("common.json"), r#"{"app": {"name": "ERP"}}"#).unwrap();

        let store = LocaleStore::new(dir.path(), "en");
        (dir, store)
    }

    #[test]
    fn segments_reject_traversal() {
        assert!(check_segment("locale", "en").is_ok());
        assert!(check_segment("locale", "pt-BR").is_ok());
        assert!(check_segment("locale", "zh_Hant").is_ok());
        assert!(check_segment("locale", "").is_err());
        assert!(check_segment("locale", "..").is_err());
        assert!(check_segment("locale", "en/../../etc").is_err());
        assert!(check_segment("namespace", "common.json").is_err());
    }

    #[test]
    fn flattening_produces_dotted_leaves() {
        let keys = flatten_keys(&json!({"a": {"b": "x", "c": {"d": 1}}, "e": "y", "f": {}}));
        let keys: Vec<_> = keys.into_iter().collect();
        assert_eq!(keys, vec!["a.b", "a.c.d", "e", "f"]);
    }

    #[actix_web::test]
    async fn lists_locales_and_namespaces() {
        let (_dir, store) = seed();
        assert_eq!(store.locales().await.unwrap(), vec!["ar", "en"]);
        assert_eq!(store.namespaces("en").await.unwrap(), vec!["common", "rental"]);
        assert!(matches!(store.namespaces("fr").await, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn bundle_and_merged_view() {
        let (_dir, store) = seed();
        let common = store.bundle("en", "common").await.unwrap();
        assert_eq!(common["app"]["name"], "ERP");

        let all = store.all("en").await.unwrap();
        assert_eq!(all["rental"]["title"], "Rentals");
        assert!(matches!(store.bundle("en", "nope").await, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn missing_keys_against_default() {
        let (_dir, store) = seed();
        let missing = store.missing_keys("ar").await.unwrap();
        assert_eq!(missing["common"], vec!["app.welcome", "save"]);
        assert_eq!(missing["rental"], vec!["title"]);
        assert!(store.missing_keys("en").await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn validate_reports_bad_files() {
        let (dir, store) = seed();
        fs::write(dir.path().join("ar").join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("ar").join("list.json"), "[1, 2]").unwrap();

        let report = store.validate("ar").await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.files_checked, 3);
        assert!(report.errors.contains_key("broken.json"));
        assert!(report.errors.contains_key("list.json"));
        assert!(store.validate("en").await.unwrap().valid);
    }

    #[actix_web::test]
    async fn write_replaces_file_and_cache() {
        let (dir, store) = seed();
        assert_eq!(store.bundle("ar", "common").await.unwrap()["app"]["name"], "ERP");

        store
            .write("ar", "common", json!({"app": {"name": "نظام"}}))
            .await
            .unwrap();
        assert_eq!(store.bundle("ar", "common").await.unwrap()["app"]["name"], "نظام");

        // No temp files left behind.
        let leftovers = fs::read_dir(dir.path().join("ar"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        assert!(matches!(
            store.write("ar", "common", json!(["x"])).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.write("../x", "common", json!({})).await.is_err());
    }
}
