//! 按扩展名选择脚本容器

use crate::error::FileError;
use crate::native;
use crate::script::ConstructionScript;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    /// 文本脚本（默认）
    Text,
    Json,
    /// MessagePack + Zstd
    Native,
}

impl ScriptFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => ScriptFormat::Json,
            Some("sgeo") => ScriptFormat::Native,
            _ => ScriptFormat::Text,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "text" | "sgs" => Some(ScriptFormat::Text),
            "json" => Some(ScriptFormat::Json),
            "native" | "sgeo" => Some(ScriptFormat::Native),
            _ => None,
        }
    }
}

/// 按扩展名加载脚本
pub fn load(path: &Path) -> Result<ConstructionScript, FileError> {
    match ScriptFormat::from_path(path) {
        ScriptFormat::Native => native::load(path),
        ScriptFormat::Json => ConstructionScript::from_json(&std::fs::read_to_string(path)?),
        ScriptFormat::Text => ConstructionScript::from_text(&std::fs::read_to_string(path)?),
    }
}

/// 以指定格式保存脚本
pub fn save(script: &ConstructionScript, path: &Path, format: ScriptFormat) -> Result<(), FileError> {
    match format {
        ScriptFormat::Native => native::save(script, path),
        ScriptFormat::Json => {
            std::fs::write(path, script.to_json()?)?;
            tracing::info!("Saved {} commands to {}", script.commands.len(), path.display());
            Ok(())
        }
        ScriptFormat::Text => {
            std::fs::write(path, script.to_text())?;
            tracing::info!("Saved {} commands to {}", script.commands.len(), path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ScriptFormat::from_path(Path::new("a.JSON")), ScriptFormat::Json);
        assert_eq!(ScriptFormat::from_path(Path::new("a.sgeo")), ScriptFormat::Native);
        assert_eq!(ScriptFormat::from_path(Path::new("a.sgs")), ScriptFormat::Text);
        assert_eq!(ScriptFormat::from_path(Path::new("noext")), ScriptFormat::Text);
        assert_eq!(ScriptFormat::from_name("native"), Some(ScriptFormat::Native));
        assert_eq!(ScriptFormat::from_name("xml"), None);
    }

    #[test]
    fn test_every_container_roundtrips() {
        let dir = TempDir::new().unwrap();
        let script = ConstructionScript::new(vec![
            "Create&kind=Point&name=P1&pos=0/0/1".to_string(),
            "Create&kind=Calculation&name=M1&token=M1&expr=2+3".to_string(),
        ]);

        for (file, format) in [
            ("s.sgs", ScriptFormat::Text),
            ("s.json", ScriptFormat::Json),
            ("s.sgeo", ScriptFormat::Native),
        ] {
            let path = dir.path().join(file);
            save(&script, &path, format).unwrap();
            assert_eq!(load(&path).unwrap(), script, "{file}");
        }
    }
}
