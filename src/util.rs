//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// No nested or conditional logic; each key is substituted once, left to right.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Cuts on a char boundary so Vietnamese diacritics never split.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_every_occurrence() {
    let out = fill_template("{a} and {a} but not {b}", &[("a", "x")]);
    assert_eq!(out, "x and x but not {b}");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "Giải thích lỗi sai";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with("Gi"));
    assert!(t.contains("bytes total"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
