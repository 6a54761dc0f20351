//! 构造脚本
//!
//! 脚本是有序的操作码字符串加上版本号。文本形式：
//!
//! ```text
//! # sgeo-script version=1
//! # id=0b9d…
//! # title=Triangle
//! # created=2024-05-01T12:00:00Z
//! Create&kind=Point&name=P1&pos=1/0/0
//! ```
//!
//! 其余以 `#` 开头的行是注释。

use crate::error::FileError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sgeo_core::config::Settings;
use sgeo_core::construction::Construction;
use uuid::Uuid;

/// 当前脚本格式版本
pub const SCRIPT_VERSION: u32 = 1;

const HEADER: &str = "# sgeo-script";

/// 脚本元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptMetadata {
    pub id: Uuid,
    pub title: String,
    pub created: DateTime<Utc>,
}

impl Default for ScriptMetadata {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            created: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionScript {
    pub version: u32,
    pub metadata: ScriptMetadata,
    pub commands: Vec<String>,
}

impl ConstructionScript {
    pub fn new(commands: Vec<String>) -> Self {
        Self {
            version: SCRIPT_VERSION,
            metadata: ScriptMetadata::default(),
            commands,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = title.into();
        self
    }

    /// 记录构造当前的撤销栈
    pub fn from_construction(construction: &Construction) -> Self {
        Self::new(construction.script())
    }

    /// 回放为新的构造
    pub fn replay(&self, settings: Settings) -> Result<Construction, FileError> {
        Ok(Construction::from_script(settings, &self.commands)?)
    }

    pub fn to_text(&self) -> String {
        let title: String = self
            .metadata
            .title
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();

        let mut text = format!("{} version={}\n", HEADER, self.version);
        text.push_str(&format!("# id={}\n", self.metadata.id));
        text.push_str(&format!("# title={}\n", title));
        text.push_str(&format!(
            "# created={}\n",
            self.metadata
                .created
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
        ));
        for command in &self.commands {
            text.push_str(command);
            text.push('\n');
        }
        text
    }

    pub fn from_text(text: &str) -> Result<Self, FileError> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

        let header = lines
            .next()
            .ok_or_else(|| FileError::InvalidFormat("Empty script".to_string()))?;
        let version = header
            .strip_prefix(HEADER)
            .and_then(|rest| rest.trim().strip_prefix("version="))
            .ok_or_else(|| FileError::InvalidFormat(format!("Missing script header: {header}")))?;
        let version: u32 = version
            .parse()
            .map_err(|_| FileError::InvalidFormat(format!("Bad script version: {version}")))?;
        check_version(version)?;

        let mut metadata = ScriptMetadata::default();
        let mut commands = Vec::new();
        for line in lines {
            let Some(comment) = line.strip_prefix('#') else {
                commands.push(line.to_string());
                continue;
            };
            match comment.trim_start().split_once('=') {
                Some(("id", value)) => {
                    metadata.id = Uuid::parse_str(value.trim())
                        .map_err(|e| FileError::InvalidFormat(format!("Bad script id: {e}")))?;
                }
                Some(("title", value)) => metadata.title = value.to_string(),
                Some(("created", value)) => {
                    metadata.created = DateTime::parse_from_rfc3339(value.trim())
                        .map_err(|e| FileError::InvalidFormat(format!("Bad timestamp: {e}")))?
                        .with_timezone(&Utc);
                }
                _ => {}
            }
        }

        Ok(Self {
            version,
            metadata,
            commands,
        })
    }

    pub fn to_json(&self) -> Result<String, FileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, FileError> {
        let script: Self = serde_json::from_str(text)?;
        check_version(script.version)?;
        Ok(script)
    }
}

/// 拒绝比当前实现更新的版本
pub(crate) fn check_version(version: u32) -> Result<(), FileError> {
    if version > SCRIPT_VERSION {
        return Err(FileError::UnsupportedVersion(format!(
            "Script version {} is newer than supported version {}",
            version, SCRIPT_VERSION
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgeo_core::math::Vector3;
    use sgeo_core::node::MeasureRule;

    fn sample() -> Construction {
        let mut construction = Construction::default();
        let a = construction.add_point(Vector3::x()).unwrap();
        let b = construction.add_point(Vector3::y()).unwrap();
        construction.add_line(a, b).unwrap();
        construction
            .measure(MeasureRule::Distance { first: a, second: b })
            .unwrap();
        construction
    }

    #[test]
    fn test_text_roundtrip() {
        let script = ConstructionScript::from_construction(&sample()).with_title("Quarter turn");
        let text = script.to_text();
        assert!(text.starts_with("# sgeo-script version=1\n"));

        let parsed = ConstructionScript::from_text(&text).unwrap();
        assert_eq!(parsed, script);
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let text = "\n# sgeo-script version=1\n# a comment\n\nCreate&kind=Point&name=P1&pos=1/0/0\n";
        let parsed = ConstructionScript::from_text(text).unwrap();
        assert_eq!(parsed.commands, vec!["Create&kind=Point&name=P1&pos=1/0/0"]);
        assert_eq!(parsed.metadata.title, "");
    }

    #[test]
    fn test_missing_header() {
        let result = ConstructionScript::from_text("Create&kind=Point&name=P1&pos=1/0/0\n");
        assert!(matches!(result, Err(FileError::InvalidFormat(_))));

        let result = ConstructionScript::from_text("   \n");
        assert!(matches!(result, Err(FileError::InvalidFormat(_))));
    }

    #[test]
    fn test_newer_version_rejected() {
        let result = ConstructionScript::from_text("# sgeo-script version=99\n");
        assert!(matches!(result, Err(FileError::UnsupportedVersion(_))));

        let mut script = ConstructionScript::new(Vec::new());
        script.version = SCRIPT_VERSION + 1;
        let json = serde_json::to_string(&script).unwrap();
        assert!(matches!(
            ConstructionScript::from_json(&json),
            Err(FileError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let script = ConstructionScript::from_construction(&sample());
        let json = script.to_json().unwrap();
        assert_eq!(ConstructionScript::from_json(&json).unwrap(), script);
    }

    #[test]
    fn test_replay_rebuilds_names() {
        let original = sample();
        let script = ConstructionScript::from_construction(&original);
        let replayed = script.replay(Settings::default()).unwrap();

        for name in ["P1", "P2", "L1", "M1"] {
            assert!(replayed.find(name).is_some(), "missing {name}");
        }
        assert_eq!(replayed.graph().len(), original.graph().len());
        assert_eq!(replayed.script(), original.script());
    }

    #[test]
    fn test_multiline_calculation_survives_text() {
        let mut construction = sample();
        construction.add_calculation("M1 +\n2").unwrap();
        let script = ConstructionScript::from_construction(&construction);

        let parsed = ConstructionScript::from_text(&script.to_text()).unwrap();
        assert_eq!(parsed.commands, script.commands);

        let replayed = parsed.replay(Settings::default()).unwrap();
        let calc = replayed.find("M2").unwrap();
        let value = replayed.graph().node(calc).unwrap().value().unwrap();
        assert!((value - (std::f64::consts::FRAC_PI_2 + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_replay_reports_unknown_name() {
        let script = ConstructionScript::new(vec!["Delete&name=P9".to_string()]);
        assert!(matches!(
            script.replay(Settings::default()),
            Err(FileError::Construction(_))
        ));
    }
}
