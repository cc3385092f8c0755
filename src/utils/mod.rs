pub mod ip;

/// 按字符截断（不会切断 UTF-8 字符）
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// 生成展示 id：`imp_<uuid>`
pub fn generate_impression_id() -> String {
    format!("imp_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("你好世界", 2), "你好");
    }

    #[test]
    fn test_impression_id_prefix() {
        let id = generate_impression_id();
        assert!(id.starts_with("imp_"));
        assert_ne!(id, generate_impression_id());
    }
}
