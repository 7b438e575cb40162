//! 从 Agent 文本输出中防御性地提取 JSON
//!
//! 依次尝试：整体解析 → ```json 代码块 → 首个 '{' 到最后一个 '}' 的子串；全部失败返回 None。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn fenced_block() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```") {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!("Invalid fenced block pattern: {}", e);
            None
        }
    })
    .as_ref()
}

/// 提取结构化结果
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(block) = fenced_block()
        .and_then(|re| re.captures(trimmed))
        .and_then(|c| c.get(1))
    {
        if let Ok(value) = serde_json::from_str(block.as_str()) {
            return Some(value);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            match serde_json::from_str(&trimmed[start..=end]) {
                Ok(value) => return Some(value),
                Err(e) => tracing::warn!("JSON parse failed: {}", e),
            }
        }
    }

    None
}

/// 截取前 max_chars 个字符（按字符而非字节，避免切断 UTF-8）
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_pattern_compiles() {
        assert!(fenced_block().is_some());
    }

    #[test]
    fn test_raw_json() {
        assert_eq!(extract_json(r#"  {"a": 1}  "#), Some(json!({"a": 1})));
    }

    #[test]
    fn test_fenced_block() {
        let text = "Here is your plan:\n```json\n{\"topic\": \"Rust\"}\n```\nEnjoy!";
        assert_eq!(extract_json(text), Some(json!({"topic": "Rust"})));
    }

    #[test]
    fn test_fenced_block_without_language_tag() {
        let text = "```\n[1, 2, 3]\n```";
        assert_eq!(extract_json(text), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_brace_substring() {
        let text = "Sure! {\"nodes\": []} Let me know.";
        assert_eq!(extract_json(text), Some(json!({"nodes": []})));
    }

    #[test]
    fn test_broken_fence_falls_back_to_braces() {
        let text = "```json\nnot json\n``` trailing {\"ok\": true}";
        assert_eq!(extract_json(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_no_structure() {
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("just words"), None);
        assert_eq!(extract_json("} backwards {"), None);
        assert_eq!(extract_json("{ broken"), None);
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("hello", 3), "hel");
        assert_eq!(excerpt("hi", 10), "hi");
        assert_eq!(excerpt("学习路径", 2), "学习");
    }
}
