// Settings commands - inspect, edit and sync PalWorldSettings.ini.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tracing::warn;
use uuid::Uuid;

use crate::commands::load_config;
use crate::settings::{self, ChangeSet, FieldSchema};
use crate::transport::{SshTransport, Transport};

/// Prints the fields of the local settings file. With `all`, every known
/// field is listed by category, falling back to its stock default.
pub async fn show(file: Option<PathBuf>, all: bool) -> Result<(), String> {
    let (path, text) = read_settings(file)?;
    let doc = settings::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))?;

    if !all {
        for (name, section) in doc.sections() {
            println!("[{}]", name);
            let sorted: BTreeMap<&String, &String> = section.iter().collect();
            for (key, value) in sorted {
                println!("  {} = {}", key, value);
            }
        }
        return Ok(());
    }

    let values = doc.settings();
    let schema = FieldSchema::global();
    let mut category = "";
    for spec in schema.fields() {
        if spec.category != category {
            if !category.is_empty() {
                println!();
            }
            category = spec.category;
            println!("[{}]", category);
        }
        match values.get(spec.name) {
            Some(value) => println!("  {} = {}", spec.name, value),
            None => println!("  {} = {} (default)", spec.name, spec.default),
        }
    }

    let unknown: BTreeMap<&String, &String> = values
        .iter()
        .filter(|(name, _)| !schema.contains(name.as_str()))
        .collect();
    if !unknown.is_empty() {
        println!("\n[Unrecognised]");
        for (name, value) in unknown {
            println!("  {} = {}", name, value);
        }
    }
    Ok(())
}

pub async fn get(field: String, file: Option<PathBuf>) -> Result<(), String> {
    let (path, text) = read_settings(file)?;
    let doc = settings::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))?;

    match doc.settings().get(&field) {
        Some(value) => {
            println!("{}", value);
            Ok(())
        }
        None => match FieldSchema::global().spec_of(&field) {
            Some(spec) => Err(format!(
                "{} is not set in {} (server default: {})",
                field,
                path.display(),
                spec.default
            )),
            None => Err(format!("{} is not set in {}", field, path.display())),
        },
    }
}

/// Applies `Field=Value` edits to the local settings file. Values are
/// checked against the schema first; `force` writes them anyway.
pub async fn set(pairs: Vec<String>, file: Option<PathBuf>, force: bool) -> Result<(), String> {
    let changes = build_changes(&pairs, force)?;
    let (path, text) = read_settings(file)?;

    // Fields the file does not carry are skipped by design; tell the
    // operator rather than silently doing nothing.
    let doc = settings::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))?;
    let present = doc.settings();
    for name in changes.keys() {
        if !present.contains_key(name) {
            println!("skipping {}: not present in the file", name);
        }
    }

    let updated = settings::apply(&text, &changes).map_err(|e| e.to_string())?;
    if updated == text {
        println!("no changes needed");
        return Ok(());
    }
    fs::write(&path, updated).map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
    println!("updated {}", path.display());
    Ok(())
}

pub async fn validate(file: Option<PathBuf>) -> Result<(), String> {
    let (path, text) = read_settings(file)?;
    let doc = settings::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))?;
    let values = doc.settings();

    let schema = FieldSchema::global();
    let offending = schema.validate(&values);
    if offending.is_empty() {
        println!("{} field(s) checked, all valid", values.len());
        return Ok(());
    }

    for name in &offending {
        if let (Some(kind), Some(value)) = (schema.kind_of(name), values.get(name)) {
            println!("{} = {} (expected {})", name, value, kind);
        }
    }
    Err(format!("{} invalid field(s)", offending.len()))
}

/// Downloads the settings file from the server into the configured local
/// path.
pub async fn pull() -> Result<(), String> {
    let config = load_config()?;
    let local = config.local_config_path.clone();
    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }

    let transport = SshTransport::new(&config);
    transport
        .download(&config.remote_config_path, &local)
        .await
        .map_err(|e| e.to_string())?;
    println!("pulled {} -> {}", config.remote_config_path, local.display());
    Ok(())
}

/// Validates the local settings file and uploads it over the server's copy.
/// The upload goes to a staging path first and is moved into place, so a
/// broken transfer cannot leave a half-written live config.
pub async fn push(force: bool) -> Result<(), String> {
    let config = load_config()?;
    let local = config.local_config_path.clone();
    let text = fs::read_to_string(&local).map_err(|e| {
        format!(
            "failed to read {}: {} (run `palwarden settings pull` first)",
            local.display(),
            e
        )
    })?;

    let doc = settings::parse(&text).map_err(|e| format!("{}: {}", local.display(), e))?;
    let offending = FieldSchema::global().validate(&doc.settings());
    if !offending.is_empty() {
        let names: Vec<String> = offending.iter().cloned().collect();
        if force {
            warn!("pushing with {} invalid field(s): {}", names.len(), names.join(", "));
        } else {
            return Err(format!(
                "validation failed for: {}; fix them or pass --force",
                names.join(", ")
            ));
        }
    }

    let transport = SshTransport::new(&config);
    let staging = format!("/tmp/palwarden-{}.ini", &Uuid::new_v4().to_string()[..8]);
    transport
        .upload(&local, &staging)
        .await
        .map_err(|e| e.to_string())?;

    let target = transport
        .resolve_path(&config.remote_config_path)
        .await
        .map_err(|e| e.to_string())?;
    let output = transport
        .run(&format!(
            "mv {} {}",
            shell_words::quote(&staging),
            shell_words::quote(&target)
        ))
        .await
        .map_err(|e| e.to_string())?;
    if !output.success() {
        let _ = transport
            .run(&format!("rm -f {}", shell_words::quote(&staging)))
            .await;
        return Err(format!(
            "failed to move settings into place: {}",
            output.error_text()
        ));
    }

    println!("pushed {} -> {}", local.display(), target);
    println!("restart the server for the new settings to take effect");
    Ok(())
}

fn read_settings(file: Option<PathBuf>) -> Result<(PathBuf, String), String> {
    let path = match file {
        Some(path) => path,
        None => load_config()?.local_config_path,
    };
    let text = fs::read_to_string(&path).map_err(|e| {
        format!(
            "failed to read {}: {} (run `palwarden settings pull` first)",
            path.display(),
            e
        )
    })?;
    Ok((path, text))
}

/// Turns `Field=Value` arguments into a change set, canonicalising values
/// through the schema. Unknown fields pass through untouched; values the
/// schema rejects are an error unless `force` is set.
fn build_changes(pairs: &[String], force: bool) -> Result<ChangeSet, String> {
    let schema = FieldSchema::global();
    let mut changes = ChangeSet::new();

    for pair in pairs {
        let (field, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected Field=Value, got '{}'", pair))?;
        let field = field.trim();
        let value = value.trim();

        match schema.kind_of(field) {
            Some(kind) => match kind.normalize(value) {
                Some(canonical) => {
                    changes.insert(field.to_string(), canonical);
                }
                None if force => {
                    warn!("writing '{}' into {} despite the schema", value, field);
                    changes.insert(field.to_string(), value.to_string());
                }
                None => {
                    return Err(format!("{} does not accept '{}' (expected {})", field, value, kind));
                }
            },
            None => {
                warn!("unknown field {}, writing as-is", field);
                changes.insert(field.to_string(), value.to_string());
            }
        }
    }
    Ok(changes)
}
