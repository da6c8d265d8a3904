//! 环境快照
//!
//! 交互式驱动每轮刷新的有界工作区状态：打开文件、最近修改文件（按 mtime 排序）、
//! 命令与工具调用历史、文件内容缓存、最近错误。各列表封顶，缓存内容截断，
//! 保证注入上下文的体积有界；回合日志本身不受此裁剪影响。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use serde_json::{Map, Value};
use walkdir::WalkDir;

pub const MAX_OPEN_FILES: usize = 10;
pub const MAX_RECENT_FILES: usize = 10;
pub const MAX_COMMAND_HISTORY: usize = 5;
pub const MAX_TOOL_CALLS: usize = 10;
pub const MAX_RECENT_ERRORS: usize = 5;
/// 单个缓存文件内容的最大字符数
pub const MAX_FILE_CONTENT_CHARS: usize = 6000;

/// 快照扫描关心的扩展名
const SNAPSHOT_EXTENSIONS: &[&str] = &[
    "rs", "toml", "md", "txt", "json", "yaml", "yml", "py", "js", "ts", "html", "css",
];

#[derive(Debug, Clone, Serialize)]
pub struct CursorPosition {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

/// 有界环境快照，序列化后作为 <user_info> 注入用户回合
#[derive(Debug, Clone, Serialize, Default)]
pub struct EnvSnapshot {
    pub workspace_path: String,
    pub os: String,
    pub open_files: Vec<String>,
    pub cursor_position: Option<CursorPosition>,
    pub recent_files: Vec<String>,
    pub command_history: Vec<String>,
    pub tool_calls: Vec<Value>,
    pub file_contents: BTreeMap<String, String>,
    pub recent_errors: Vec<String>,
}

impl EnvSnapshot {
    pub fn new(workspace: &Path) -> Self {
        Self {
            workspace_path: workspace.display().to_string(),
            os: std::env::consts::OS.to_string(),
            ..Self::default()
        }
    }

    /// 记录被创建/修改的文件，进入打开文件列表
    pub fn note_file_touched(&mut self, path: &str) {
        if !self.open_files.iter().any(|f| f == path) {
            self.open_files.push(path.to_string());
        }
        cap_front(&mut self.open_files, MAX_OPEN_FILES);
    }

    pub fn record_command(&mut self, command: &str) {
        self.command_history.push(command.to_string());
        cap_front(&mut self.command_history, MAX_COMMAND_HISTORY);
    }

    pub fn record_tool_call(&mut self, name: &str, args: &Map<String, Value>) {
        self.tool_calls.push(serde_json::json!({
            "tool": name,
            "args": args,
        }));
        cap_front(&mut self.tool_calls, MAX_TOOL_CALLS);
    }

    pub fn record_error(&mut self, error: &str) {
        self.recent_errors.push(error.to_string());
        cap_front(&mut self.recent_errors, MAX_RECENT_ERRORS);
    }

    /// 重扫工作区：按 mtime 取最近修改文件，刷新打开文件的内容缓存与模拟光标位置
    pub fn refresh(&mut self) {
        self.recent_files = scan_recent_files(Path::new(&self.workspace_path));

        self.file_contents.clear();
        for path in &self.open_files {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    let truncated: String =
                        content.chars().take(MAX_FILE_CONTENT_CHARS).collect();
                    self.file_contents.insert(path.clone(), truncated);
                }
                Err(e) => {
                    tracing::debug!(path = %path, error = %e, "snapshot: unreadable open file");
                }
            }
        }

        self.cursor_position = self.open_files.last().map(|file| {
            let line_count = self
                .file_contents
                .get(file)
                .map(|c| c.lines().count())
                .unwrap_or(0);
            CursorPosition {
                file: file.clone(),
                line: line_count.min(10),
                column: 0,
            }
        });
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

fn cap_front<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        let excess = items.len() - max;
        items.drain(..excess);
    }
}

fn scan_recent_files(workspace: &Path) -> Vec<String> {
    let mut files: Vec<(PathBuf, SystemTime)> = WalkDir::new(workspace)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| SNAPSHOT_EXTENSIONS.contains(&e))
                .unwrap_or(false)
        })
        .filter_map(|entry| {
            let mtime = entry.metadata().ok()?.modified().ok()?;
            Some((entry.into_path(), mtime))
        })
        .collect();

    files.sort_by(|a, b| b.1.cmp(&a.1));
    files.truncate(MAX_RECENT_FILES);
    files
        .into_iter()
        .map(|(path, _)| path.display().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_lists_are_capped() {
        let mut snapshot = EnvSnapshot::new(Path::new("."));
        for i in 0..20 {
            snapshot.record_command(&format!("cmd {}", i));
            snapshot.record_tool_call("echo", &Map::new());
            snapshot.record_error(&format!("err {}", i));
        }
        assert_eq!(snapshot.command_history.len(), MAX_COMMAND_HISTORY);
        assert_eq!(snapshot.tool_calls.len(), MAX_TOOL_CALLS);
        assert_eq!(snapshot.recent_errors.len(), MAX_RECENT_ERRORS);
        // 裁剪保留最近的一段
        assert_eq!(snapshot.command_history.last().unwrap(), "cmd 19");
        assert_eq!(snapshot.command_history.first().unwrap(), "cmd 15");
    }

    #[test]
    fn test_note_file_touched_deduplicates() {
        let mut snapshot = EnvSnapshot::new(Path::new("."));
        snapshot.note_file_touched("a.rs");
        snapshot.note_file_touched("a.rs");
        snapshot.note_file_touched("b.rs");
        assert_eq!(snapshot.open_files, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn test_refresh_scans_workspace_and_caches_contents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rs");
        std::fs::write(&file, "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# notes\n").unwrap();
        std::fs::write(dir.path().join("ignored.bin"), [0u8; 4]).unwrap();

        let mut snapshot = EnvSnapshot::new(dir.path());
        snapshot.note_file_touched(&file.display().to_string());
        snapshot.refresh();

        assert_eq!(snapshot.recent_files.len(), 2);
        assert!(snapshot
            .file_contents
            .get(&file.display().to_string())
            .unwrap()
            .contains("fn main"));
        let cursor = snapshot.cursor_position.as_ref().unwrap();
        assert_eq!(cursor.file, file.display().to_string());
        assert_eq!(cursor.line, 1);
    }

    #[test]
    fn test_to_value_is_object_with_expected_fields() {
        let snapshot = EnvSnapshot::new(Path::new("/tmp/ws"));
        let value = snapshot.to_value();
        assert!(value.get("open_files").is_some());
        assert!(value.get("recent_files").is_some());
        assert_eq!(value["workspace_path"], json!("/tmp/ws"));
    }
}
