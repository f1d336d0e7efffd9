//! Key/value configuration map with typed access to the `defaults` object.

use chrono::NaiveTime;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use super::{Database, DbError};

/// Creation-time defaults, stored under the reserved `defaults` config key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Defaults {
    pub curve_type: String,
    #[serde(with = "hhmm")]
    pub work_hours_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub work_hours_end: NaiveTime,
    pub default_estimate_minutes: i64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            curve_type: "linear".to_string(),
            work_hours_start: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            work_hours_end: NaiveTime::from_hms_opt(17, 0, 0).expect("valid time"),
            default_estimate_minutes: 30,
        }
    }
}

impl Defaults {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("defaults serialize")
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&crate::db::models::format_hhmm(*v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(de)?;
        crate::db::models::parse_hhmm(&s)
            .ok_or_else(|| D::Error::custom(format!("invalid HH:MM time: {}", s)))
    }
}

impl Database {
    pub fn get_config(&self, key: &str) -> Result<Option<String>, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM config WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(DbError::from)
        })
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO config (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [key, value],
            )?;
            Ok(())
        })
    }

    /// Typed view of the `defaults` config object. A missing or malformed
    /// entry yields the built-in defaults.
    pub fn defaults(&self) -> Result<Defaults, DbError> {
        let raw = self.get_config("defaults")?;
        Ok(raw
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default())
    }

    pub fn set_defaults(&self, defaults: &Defaults) -> Result<(), DbError> {
        self.set_config("defaults", &defaults.to_json())
    }
}
