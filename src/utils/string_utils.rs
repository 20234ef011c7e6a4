/// 将 PascalCase / camelCase 名称转换为 snake_case 列名
///
/// 连续大写视为缩写：`CategoryID` → `category_id`，`HTTPServer` → `http_server`
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower)
                {
                    result.push('_');
                }
            }
            result.extend(c.to_lowercase());
        } else if c == ' ' || c == '-' {
            result.push('_');
        } else {
            result.push(c);
        }
    }
    result
}

/// 按分隔符切分顶层片段，忽略括号与引号内部的分隔符
///
/// 单引号内的 `''` 是转义，按两次切换处理即可。
/// 括号或引号不配对时返回出错处的字节偏移量。
pub fn split_top_level(input: &str, sep: char) -> Result<Vec<&str>, usize> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut quote_start = 0;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                quote_start = i;
            }
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Err(i);
                }
                depth -= 1;
            }
            c if c == sep && depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(quote_start);
    }
    if depth != 0 {
        return Err(input.len());
    }
    parts.push(input[start..].trim());
    Ok(parts)
}

/// 转义 LIKE 模式中的通配符，配合 `ESCAPE '\'` 使用
pub fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// 去掉 OData 字符串的外层单引号并还原 `''`
pub fn unquote(s: &str) -> Option<String> {
    let inner = s.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("CategoryID"), "category_id");
        assert_eq!(to_snake_case("ProductName"), "product_name");
        assert_eq!(to_snake_case("ID"), "id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("price"), "price");
        assert_eq!(to_snake_case("Line2Total"), "line2_total");
    }

    #[test]
    fn test_split_respects_nesting() {
        let parts = split_top_level("Books($filter=contains(Title,'a,b')),Author", ',')
            .expect("切分应该成功");
        assert_eq!(parts, vec!["Books($filter=contains(Title,'a,b'))", "Author"]);
    }

    #[test]
    fn test_split_escaped_quote() {
        let parts = split_top_level("Name eq 'O''Neil;x';Other", ';').expect("切分应该成功");
        assert_eq!(parts, vec!["Name eq 'O''Neil;x'", "Other"]);
    }

    #[test]
    fn test_split_unbalanced() {
        assert!(split_top_level("Books($top=1", ',').is_err());
        assert!(split_top_level("Books)", ',').is_err());
        assert!(split_top_level("Name eq 'abc", ',').is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'O''Neil'").as_deref(), Some("O'Neil"));
        assert_eq!(unquote("plain"), None);
    }
}
