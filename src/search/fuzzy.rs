//! 模糊匹配算法
//!
//! 按字符（而不是字节）计算编辑距离，多字节文本也能正确比较。

/// Levenshtein 编辑距离
pub fn levenshtein_distance(s1: &[char], s2: &[char]) -> usize {
    let (len1, len2) = (s1.len(), s2.len());
    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    // 只保留上一行
    let mut prev: Vec<usize> = (0..=len2).collect();
    let mut curr = vec![0; len2 + 1];

    for i in 1..=len1 {
        curr[0] = i;
        for j in 1..=len2 {
            let cost = if s1[i - 1] == s2[j - 1] { 0 } else { 1 };
            curr[j] = std::cmp::min(
                std::cmp::min(
                    prev[j] + 1,     // deletion
                    curr[j - 1] + 1, // insertion
                ),
                prev[j - 1] + cost, // substitution
            );
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[len2]
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    levenshtein_distance(&a, &b)
}

/// 相似度 `1 - 距离 / 较长长度`，两个空串相似度为 1
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(&a, &b) as f64 / longest as f64
}

/// 文本中与词项最接近的片段的编辑距离
///
/// 窗口长度在 `词项长度 ± max_distance` 范围内滑动，同时比较整个文本
fn best_window_distance(text: &[char], term: &[char], max_distance: usize) -> usize {
    let mut best = levenshtein_distance(text, term);
    let min_len = term.len().saturating_sub(max_distance).max(1);
    let max_len = term.len() + max_distance;

    for len in min_len..=max_len.min(text.len()) {
        for start in 0..=(text.len() - len) {
            let distance = levenshtein_distance(&text[start..start + len], term);
            if distance < best {
                best = distance;
                if best == 0 {
                    return 0;
                }
            }
        }
    }
    best
}

/// 模糊包含
///
/// 模糊度不超过 1 时是不区分大小写的精确包含；否则允许的最大编辑距离为 `模糊度 - 1`
pub fn fuzzy_contains(text: &str, term: &str, fuzziness: u32) -> bool {
    let text = text.to_lowercase();
    let term = term.to_lowercase();
    if term.is_empty() || text.contains(&term) {
        return true;
    }
    if fuzziness <= 1 {
        return false;
    }

    let max_distance = (fuzziness - 1) as usize;
    let text_chars: Vec<char> = text.chars().collect();
    let term_chars: Vec<char> = term.chars().collect();
    best_window_distance(&text_chars, &term_chars, max_distance) <= max_distance
}

/// 文本中任一片段与词项的最高相似度
pub fn best_similarity(text: &str, term: &str) -> f64 {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let term: Vec<char> = term.to_lowercase().chars().collect();
    if term.is_empty() {
        return 1.0;
    }
    let distance = best_window_distance(&text, &term, term.len() / 2);
    1.0 - distance.min(term.len()) as f64 / term.len() as f64
}
