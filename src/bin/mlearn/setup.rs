//! Hook configuration for Claude Code integration
//!
//! Adds and removes the mlearn hook commands in `~/.claude/settings.json`:
//! tool hooks run `mlearn track`, the Stop hook runs `mlearn analyze`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

/// Marker identifying hook commands owned by mlearn.
const COMMAND_MARKER: &str = "mlearn";

/// Hook types mlearn installs, with the subcommand each one runs.
const HOOKS: &[(&str, &str)] = &[
    ("PostToolUse", "track"),
    ("PostToolUseFailure", "track"),
    ("Stop", "analyze"),
];

/// Returns the path to Claude Code settings.json
fn claude_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join("settings.json"))
}

/// Command line invoked by a hook, using this executable's path when known.
fn hook_command(subcommand: &str) -> String {
    let program = std::env::current_exe()
        .ok()
        .filter(|exe| exe.file_stem().is_some_and(|s| s == COMMAND_MARKER))
        .map(|exe| exe.to_string_lossy().to_string())
        .unwrap_or_else(|| COMMAND_MARKER.to_string());
    format!("{program} {subcommand}")
}

/// Reads settings, returns an empty object if the file doesn't exist
fn read_settings(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(json!({}));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_settings(path: &Path, settings: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Creates a hook entry. Tool hooks match every tool.
fn create_hook_entry(hook_type: &str, command: &str) -> Value {
    let hook = json!({
        "type": "command",
        "command": command
    });

    if hook_type.ends_with("ToolUse") || hook_type.ends_with("ToolUseFailure") {
        json!({ "matcher": "*", "hooks": [hook] })
    } else {
        json!({ "hooks": [hook] })
    }
}

fn is_mlearn_entry(entry: &Value) -> bool {
    entry
        .get("hooks")
        .and_then(Value::as_array)
        .is_some_and(|hooks| {
            hooks.iter().any(|hook| {
                hook.get("command")
                    .and_then(Value::as_str)
                    .is_some_and(|cmd| {
                        cmd.split_whitespace()
                            .next()
                            .and_then(|program| Path::new(program).file_stem())
                            .is_some_and(|stem| stem == COMMAND_MARKER)
                    })
            })
        })
}

/// Adds missing mlearn hooks. Returns the hook types that were added.
fn install_hooks(settings: &mut Value) -> Result<Vec<&'static str>> {
    let root = settings
        .as_object_mut()
        .context("settings is not a JSON object")?;
    let hooks = root
        .entry("hooks")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .context("hooks is not an object")?;

    let mut added = Vec::new();
    for &(hook_type, subcommand) in HOOKS {
        let entries = hooks
            .entry(hook_type)
            .or_insert_with(|| json!([]))
            .as_array_mut()
            .context("hook type is not an array")?;

        if !entries.iter().any(is_mlearn_entry) {
            entries.push(create_hook_entry(hook_type, &hook_command(subcommand)));
            added.push(hook_type);
        }
    }
    Ok(added)
}

/// Removes mlearn hooks, dropping emptied arrays. Returns the hook types touched.
fn remove_hooks(settings: &mut Value) -> Vec<&'static str> {
    let Some(hooks) = settings.get_mut("hooks").and_then(Value::as_object_mut) else {
        return Vec::new();
    };

    let mut removed = Vec::new();
    for &(hook_type, _) in HOOKS {
        let Some(entries) = hooks.get_mut(hook_type).and_then(Value::as_array_mut) else {
            continue;
        };
        let before = entries.len();
        entries.retain(|entry| !is_mlearn_entry(entry));
        if entries.len() != before {
            removed.push(hook_type);
        }
        if entries.is_empty() {
            hooks.remove(hook_type);
        }
    }
    removed
}

/// Installs mlearn hooks into Claude Code settings
pub fn setup() -> Result<()> {
    let path = claude_settings_path().context("Could not determine home directory")?;
    println!("Configuring Claude Code hooks in {}...", path.display());

    let mut settings = read_settings(&path)?;
    let added = install_hooks(&mut settings)?;

    for &(hook_type, _) in HOOKS {
        if added.contains(&hook_type) {
            println!("  {hook_type} - added");
        } else {
            println!("  {hook_type} - already configured");
        }
    }

    if added.is_empty() {
        println!("\nAll hooks already configured.");
    } else {
        write_settings(&path, &settings)?;
        println!("\nConfiguration complete!");
    }
    Ok(())
}

/// Removes mlearn hooks from Claude Code settings
pub fn uninstall() -> Result<()> {
    let path = claude_settings_path().context("Could not determine home directory")?;
    println!("Removing Claude Code hooks from {}...", path.display());

    let mut settings = read_settings(&path)?;
    let removed = remove_hooks(&mut settings);

    if removed.is_empty() {
        println!("  No hooks found");
        return Ok(());
    }
    for hook_type in &removed {
        println!("  {hook_type} - removed");
    }
    write_settings(&path, &settings)?;
    println!("\nmlearn hooks removed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent() {
        let mut settings = json!({});
        assert_eq!(
            install_hooks(&mut settings).unwrap(),
            vec!["PostToolUse", "PostToolUseFailure", "Stop"]
        );
        assert!(install_hooks(&mut settings).unwrap().is_empty());

        let stop = settings["hooks"]["Stop"].as_array().unwrap();
        assert_eq!(stop.len(), 1);
        assert!(stop[0].get("matcher").is_none());
        assert_eq!(settings["hooks"]["PostToolUse"][0]["matcher"], "*");
        assert!(settings["hooks"]["Stop"][0]["hooks"][0]["command"]
            .as_str()
            .unwrap()
            .ends_with("analyze"));
    }

    #[test]
    fn test_install_keeps_foreign_hooks() {
        let mut settings = json!({
            "model": "opus",
            "hooks": {
                "Stop": [{"hooks": [{"type": "command", "command": "/usr/bin/notify-done"}]}]
            }
        });
        install_hooks(&mut settings).unwrap();
        assert_eq!(settings["hooks"]["Stop"].as_array().unwrap().len(), 2);
        assert_eq!(settings["model"], "opus");
    }

    #[test]
    fn test_remove_only_mlearn_hooks() {
        let mut settings = json!({
            "hooks": {
                "Stop": [
                    {"hooks": [{"type": "command", "command": "/usr/bin/notify-done"}]},
                    {"hooks": [{"type": "command", "command": "/home/u/.cargo/bin/mlearn analyze"}]}
                ],
                "PostToolUse": [
                    {"matcher": "*", "hooks": [{"type": "command", "command": "mlearn track"}]}
                ]
            }
        });

        let removed = remove_hooks(&mut settings);
        assert_eq!(removed, vec!["PostToolUse", "Stop"]);
        assert!(settings["hooks"].get("PostToolUse").is_none());
        assert_eq!(settings["hooks"]["Stop"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_similar_program_names_are_not_ours() {
        let entry = json!({"hooks": [{"command": "mlearn-legacy track"}]});
        assert!(!is_mlearn_entry(&entry));
    }

    #[test]
    fn test_settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".claude").join("settings.json");
        assert_eq!(read_settings(&path).unwrap(), json!({}));

        let mut settings = read_settings(&path).unwrap();
        install_hooks(&mut settings).unwrap();
        write_settings(&path, &settings).unwrap();
        assert_eq!(read_settings(&path).unwrap(), settings);
    }
}
