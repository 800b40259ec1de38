//! Android device control via ADB (Android Debug Bridge).
//!
//! Provides the platform wrappers behind the phone tools:
//! - List connected devices
//! - Tap, swipe, type and press keys
//! - Dump the UI hierarchy for the ADB-backed UI source
//! - Launch apps, send SMS, place calls, look up contacts
//! - Forward the automation port to the host
//!
//! # Requirements
//!
//! ADB must be installed and on PATH (or configured via `device.adb_path`).

use std::collections::BTreeMap;
use std::time::Duration;

use aria_core::{AriaError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ─── Types ──────────────────────────────────────────────────────

/// Info about a connected Android device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndroidDevice {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
    pub android_version: Option<String>,
}

/// A contact merged from one or more phone rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub numbers: Vec<String>,
}

impl Contact {
    pub fn primary_number(&self) -> Option<&str> {
        self.numbers.first().map(String::as_str)
    }
}

// ─── ADB Bridge ──────────────────────────────────────────────────

/// Android Debug Bridge interface.
pub struct AndroidBridge {
    adb_path: String,
    /// The serial of the target device (None = auto-select single device).
    serial: Option<String>,
    timeout: Duration,
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl AndroidBridge {
    pub fn new() -> Self {
        Self {
            adb_path: "adb".into(),
            serial: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_adb_path(mut self, path: impl Into<String>) -> Self {
        self.adb_path = path.into();
        self
    }

    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Run an ADB command and return stdout.
    async fn adb(&self, args: &[&str]) -> Result<String> {
        let mut cmd = tokio::process::Command::new(&self.adb_path);

        if let Some(ref serial) = self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd.kill_on_drop(true);

        debug!(adb = %self.adb_path, ?args, "running adb");
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                AriaError::Device(format!(
                    "ADB command timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                AriaError::Device(format!("ADB not found or failed to start ({}): {e}", self.adb_path))
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AriaError::Device(format!("ADB error: {}", stderr.trim())))
        }
    }

    /// Run a shell command on the Android device.
    pub async fn shell(&self, cmd: &str) -> Result<String> {
        self.adb(&["shell", cmd]).await
    }

    // ── Devices ────────────────────────────────────────────────

    /// List connected Android devices.
    pub async fn list_devices(&self) -> Result<Vec<AndroidDevice>> {
        let output = self.adb(&["devices", "-l"]).await?;
        let mut devices = parse_devices(&output);

        for device in &mut devices {
            if device.state != "device" {
                continue;
            }
            let version = tokio::process::Command::new(&self.adb_path)
                .args(["-s", &device.serial, "shell", "getprop ro.build.version.release"])
                .output()
                .await;
            if let Ok(out) = version
                && out.status.success()
            {
                let v = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if !v.is_empty() {
                    device.android_version = Some(v);
                }
            }
        }

        Ok(devices)
    }

    /// Forward a host TCP port to the same port on the device.
    pub async fn forward(&self, port: u16) -> Result<()> {
        let spec = format!("tcp:{port}");
        self.adb(&["forward", &spec, &spec]).await?;
        info!(port, "adb port forward established");
        Ok(())
    }

    // ── Input ──────────────────────────────────────────────────

    /// Tap at screen coordinates.
    pub async fn tap(&self, x: i32, y: i32) -> Result<()> {
        self.shell(&format!("input tap {x} {y}")).await?;
        Ok(())
    }

    /// Swipe from one point to another.
    pub async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> Result<()> {
        self.shell(&format!("input swipe {x1} {y1} {x2} {y2} {duration_ms}"))
            .await?;
        Ok(())
    }

    /// Type text into the focused field.
    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.shell(&input_text_command(text)).await?;
        Ok(())
    }

    /// Press a key by friendly name or raw `KEYCODE_*`.
    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.shell(&format!("input keyevent {}", shell_quote(&keycode(key))))
            .await?;
        Ok(())
    }

    pub async fn expand_notifications(&self) -> Result<()> {
        self.shell("cmd statusbar expand-notifications").await?;
        Ok(())
    }

    /// The UI hierarchy as `uiautomator` XML.
    pub async fn dump_ui(&self) -> Result<String> {
        let raw = self
            .shell("uiautomator dump /sdcard/aria_ui.xml >/dev/null && cat /sdcard/aria_ui.xml && rm /sdcard/aria_ui.xml")
            .await?;
        extract_hierarchy(&raw)
            .map(str::to_string)
            .ok_or_else(|| AriaError::Device("uiautomator produced no hierarchy".into()))
    }

    // ── Apps & telephony ───────────────────────────────────────

    /// Launch an app by package name.
    pub async fn launch_app(&self, package: &str) -> Result<()> {
        let output = self
            .shell(&format!(
                "monkey -p {} -c android.intent.category.LAUNCHER 1",
                shell_quote(package)
            ))
            .await?;
        if output.contains("No activities found") {
            return Err(AriaError::Device(format!("no launchable activity in {package}")));
        }
        info!(package, "app launched");
        Ok(())
    }

    /// Open the SMS composer for `to` with `body` and confirm the send.
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        self.shell(&sms_command(to, body)).await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.press_key("enter").await?;
        info!(to, chars = body.len(), "sms dispatched");
        Ok(())
    }

    /// Place a call. Everything except digits and `+` is stripped from `number`.
    pub async fn dial(&self, number: &str) -> Result<String> {
        let digits = dialable(number);
        if digits.is_empty() {
            return Err(AriaError::Device(format!("not a dialable number: {number}")));
        }
        self.shell(&format!(
            "am start -a android.intent.action.CALL -d {}",
            shell_quote(&format!("tel:{digits}"))
        ))
        .await?;
        info!(number = %digits, "call placed");
        Ok(digits)
    }

    /// Contacts whose name or number contains `query`, sorted by name.
    pub async fn search_contacts(&self, query: &str, limit: usize) -> Result<Vec<Contact>> {
        let output = self.shell(&contacts_query_command(query, limit)).await?;
        let mut contacts = parse_contact_rows(&output);
        contacts.truncate(limit.max(1));
        Ok(contacts)
    }

    /// Best match for `name`: exact case-insensitive name, else the first hit.
    pub async fn find_contact(&self, name: &str) -> Result<Option<Contact>> {
        let contacts = self.search_contacts(name, 10).await?;
        Ok(best_contact(contacts, name))
    }
}

/// Check if ADB is available on the system.
pub async fn check_adb_available(adb_path: &str) -> bool {
    tokio::process::Command::new(adb_path)
        .arg("version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

// ─── Parsing helpers ─────────────────────────────────────────────

/// Parse `adb devices -l` output.
pub fn parse_devices(output: &str) -> Vec<AndroidDevice> {
    output
        .lines()
        .skip_while(|l| !l.starts_with("List of devices"))
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let model = parts
                .iter()
                .find_map(|p| p.strip_prefix("model:"))
                .map(str::to_string);
            Some(AndroidDevice {
                serial: parts[0].to_string(),
                state: parts[1].to_string(),
                model,
                android_version: None,
            })
        })
        .collect()
}

/// Parse `content query` rows (`Row: 0 contact_id=3, display_name=Mom, number=+1555...`)
/// and merge numbers per contact, keeping first-seen order.
pub fn parse_contact_rows(output: &str) -> Vec<Contact> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: BTreeMap<String, Contact> = BTreeMap::new();

    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix("Row:") else {
            continue;
        };
        let fields = rest
            .trim_start()
            .split_once(' ')
            .map(|(_, f)| f)
            .unwrap_or_default();

        let mut row: BTreeMap<&str, &str> = BTreeMap::new();
        for field in fields.split(", ") {
            if let Some((k, v)) = field.split_once('=') {
                row.insert(k.trim(), v.trim());
            }
        }

        let Some(name) = row.get("display_name").filter(|n| !n.is_empty() && **n != "NULL") else {
            continue;
        };
        let id = row
            .get("contact_id")
            .map(|s| s.to_string())
            .unwrap_or_else(|| name.to_string());

        let contact = merged.entry(id.clone()).or_insert_with(|| {
            order.push(id.clone());
            Contact {
                id: id.clone(),
                name: name.to_string(),
                numbers: Vec::new(),
            }
        });
        if let Some(number) = row.get("number").filter(|n| !n.is_empty() && **n != "NULL")
            && !contact.numbers.iter().any(|n| n == number)
        {
            contact.numbers.push(number.to_string());
        }
    }

    order
        .into_iter()
        .filter_map(|id| merged.remove(&id))
        .collect()
}

pub fn best_contact(contacts: Vec<Contact>, name: &str) -> Option<Contact> {
    let wanted = name.trim().to_lowercase();
    let exact = contacts
        .iter()
        .position(|c| c.name.to_lowercase() == wanted);
    match exact {
        Some(i) => contacts.into_iter().nth(i),
        None => contacts.into_iter().next(),
    }
}

/// Strip `uiautomator`'s status chatter around the XML document.
pub fn extract_hierarchy(raw: &str) -> Option<&str> {
    let start = raw.find("<?xml").or_else(|| raw.find("<hierarchy"))?;
    let body = &raw[start..];
    let end = body.rfind("</hierarchy>").map(|i| i + "</hierarchy>".len());
    Some(end.map_or(body, |e| &body[..e]))
}

pub fn dialable(number: &str) -> String {
    number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// `true` when `s` looks like a phone number rather than a contact name.
pub fn is_phone_number(s: &str) -> bool {
    let digits = s.chars().filter(char::is_ascii_digit).count();
    digits >= 3
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
}

/// Quote `s` as one `sh` word. The device shell re-parses everything
/// `adb shell` sends, so every interpolated value goes through here.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// `value` as a single-quoted SQL string literal.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn input_text_command(text: &str) -> String {
    format!("input text {}", shell_quote(text))
}

pub fn sms_command(to: &str, body: &str) -> String {
    format!(
        "am start -a android.intent.action.SENDTO -d {} --es sms_body {} --ez exit_on_sent true",
        shell_quote(&format!("smsto:{to}")),
        shell_quote(body)
    )
}

pub fn contacts_query_command(query: &str, limit: usize) -> String {
    let pattern = sql_literal(&format!("%{query}%"));
    let clause = format!("display_name LIKE {pattern} OR number LIKE {pattern}");
    format!(
        "content query --uri content://com.android.contacts/data/phones \
         --projection contact_id,display_name,number \
         --where {} --sort {} --limit {limit}",
        shell_quote(&clause),
        shell_quote("display_name ASC")
    )
}

fn keycode(key: &str) -> String {
    let lower = key.trim().to_lowercase();
    let code = match lower.as_str() {
        "home" => "KEYCODE_HOME",
        "back" => "KEYCODE_BACK",
        "enter" | "return" => "KEYCODE_ENTER",
        "tab" => "KEYCODE_TAB",
        "menu" | "recent" | "recents" => "KEYCODE_APP_SWITCH",
        "power" => "KEYCODE_POWER",
        "volume_up" => "KEYCODE_VOLUME_UP",
        "volume_down" => "KEYCODE_VOLUME_DOWN",
        "delete" | "backspace" => "KEYCODE_DEL",
        "escape" | "esc" => "KEYCODE_ESCAPE",
        _ => return key.trim().to_string(),
    };
    code.to_string()
}
