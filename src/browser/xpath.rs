/// Compiles the structural XPath subset used by the locators into CSS selectors.
///
/// Supported: `//`, `.//`, `/` steps; tag names or `*`; predicates joined by `and`
/// built from `@attr`, `@attr='v'`, `contains(@attr,'v')`, `starts-with(@attr,'v')`
/// and, on the last step only, `contains(text(),'v')` / `contains(.,'v')`.
use super::BrowserError;

/// Result of compiling an XPath expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledXPath {
    /// Equivalent CSS selector
    pub css: String,
    /// Substring the element's text must contain
    pub text_contains: Option<String>,
    /// `//x` searches the whole document even when a parent is given
    pub absolute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

pub fn compile(expr: &str) -> Result<CompiledXPath, BrowserError> {
    let unsupported = |reason: &str| BrowserError::UnsupportedLocator {
        locator: expr.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = expr.trim();
    let (absolute, first_axis, rest) = if let Some(rest) = trimmed.strip_prefix(".//") {
        (false, Axis::Descendant, rest)
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        (true, Axis::Descendant, rest)
    } else if trimmed.starts_with("./") {
        return Err(unsupported("relative child axis"));
    } else if let Some(rest) = trimmed.strip_prefix('/') {
        (true, Axis::Child, rest)
    } else {
        (false, Axis::Descendant, trimmed)
    };

    let steps = split_steps(rest, first_axis).map_err(|reason| unsupported(&reason))?;
    if steps.is_empty() {
        return Err(unsupported("empty path"));
    }

    let mut css = String::new();
    let mut text_contains = None;
    let last = steps.len() - 1;

    for (i, (axis, step)) in steps.iter().enumerate() {
        if i > 0 {
            css.push_str(match axis {
                Axis::Child => " > ",
                Axis::Descendant => " ",
            });
        }
        let compiled = compile_step(step).map_err(|reason| unsupported(&reason))?;
        if compiled.text_contains.is_some() {
            if i != last {
                return Err(unsupported("text() predicate is only allowed on the last step"));
            }
            text_contains = compiled.text_contains;
        }
        css.push_str(&compiled.css);
    }

    Ok(CompiledXPath {
        css,
        text_contains,
        absolute,
    })
}

/// Split a path into steps, keeping separators inside predicates and quotes.
fn split_steps(path: &str, first_axis: Axis) -> Result<Vec<(Axis, String)>, String> {
    let mut steps = Vec::new();
    let mut current = String::new();
    let mut axis = first_axis;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            current.push(c);
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.checked_sub(1).ok_or("unbalanced ']'")?;
                current.push(c);
            }
            '/' if depth == 0 => {
                if current.is_empty() {
                    return Err("empty step".to_string());
                }
                steps.push((axis, std::mem::take(&mut current)));
                axis = if chars.peek() == Some(&'/') {
                    chars.next();
                    Axis::Descendant
                } else {
                    Axis::Child
                };
            }
            _ => current.push(c),
        }
    }

    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    if depth != 0 {
        return Err("unbalanced '['".to_string());
    }
    if !current.is_empty() {
        steps.push((axis, current));
    } else if !steps.is_empty() {
        return Err("trailing separator".to_string());
    }

    Ok(steps)
}

struct CompiledStep {
    css: String,
    text_contains: Option<String>,
}

fn compile_step(step: &str) -> Result<CompiledStep, String> {
    let step = step.trim();
    let name_end = step.find('[').unwrap_or(step.len());
    let name = step[..name_end].trim();

    if name.is_empty() {
        return Err(format!("missing node test in step '{}'", step));
    }
    if name != "*" && !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(format!("unsupported node test '{}'", name));
    }

    let mut css = name.to_string();
    let mut text_contains = None;

    for predicate in split_predicates(&step[name_end..])? {
        for term in split_and(&predicate) {
            match compile_term(term.trim())? {
                Term::Css(fragment) => css.push_str(&fragment),
                Term::TextContains(needle) => text_contains = Some(needle),
            }
        }
    }

    Ok(CompiledStep { css, text_contains })
}

/// `[a][b]` -> `["a", "b"]`
fn split_predicates(input: &str) -> Result<Vec<String>, String> {
    let mut predicates = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            current.push(c);
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '[' => {
                if depth > 0 {
                    current.push(c);
                }
                depth += 1;
            }
            ']' => {
                depth = depth.checked_sub(1).ok_or("unbalanced ']'")?;
                if depth == 0 {
                    predicates.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            c if depth == 0 && !c.is_whitespace() => {
                return Err(format!("unexpected '{}' after node test", c));
            }
            _ => {
                if depth > 0 {
                    current.push(c);
                }
            }
        }
    }

    Ok(predicates)
}

/// Split a predicate on top-level ` and `.
fn split_and(predicate: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let chars: Vec<char> = predicate.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            current.push(c);
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0
            && c.is_whitespace()
            && i + 4 < chars.len()
            && chars[i + 1..i + 4] == ['a', 'n', 'd']
            && chars[i + 4].is_whitespace()
        {
            terms.push(std::mem::take(&mut current));
            i += 5;
            continue;
        }
        current.push(c);
        i += 1;
    }
    terms.push(current);
    terms
}

enum Term {
    Css(String),
    TextContains(String),
}

fn compile_term(term: &str) -> Result<Term, String> {
    if let Some(attr) = term.strip_prefix('@') {
        return match attr.split_once('=') {
            Some((name, value)) => Ok(Term::Css(format!(
                "[{}=\"{}\"]",
                attr_name(name)?,
                css_escape(&unquote(value.trim())?)
            ))),
            None => Ok(Term::Css(format!("[{}]", attr_name(attr)?))),
        };
    }

    let (function, subject, value) = parse_call(term)?;
    match (function, subject) {
        ("contains", "text()") | ("contains", ".") => Ok(Term::TextContains(value)),
        ("contains", subject) if subject.starts_with('@') => Ok(Term::Css(format!(
            "[{}*=\"{}\"]",
            attr_name(&subject[1..])?,
            css_escape(&value)
        ))),
        ("starts-with", subject) if subject.starts_with('@') => Ok(Term::Css(format!(
            "[{}^=\"{}\"]",
            attr_name(&subject[1..])?,
            css_escape(&value)
        ))),
        _ => Err(format!("unsupported predicate '{}'", term)),
    }
}

/// `contains(@href, 'genres:')` -> `("contains", "@href", "genres:")`
fn parse_call(term: &str) -> Result<(&str, &str, String), String> {
    let open = term
        .find('(')
        .ok_or_else(|| format!("unsupported predicate '{}'", term))?;
    if !term.ends_with(')') {
        return Err(format!("unsupported predicate '{}'", term));
    }
    let function = term[..open].trim();
    let args = &term[open + 1..term.len() - 1];

    let mut depth = 0usize;
    let mut split_at = None;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
    }
    let split_at = split_at.ok_or_else(|| format!("expected two arguments in '{}'", term))?;
    let subject = args[..split_at].trim();
    let value = unquote(args[split_at + 1..].trim())?;

    Ok((function, subject, value))
}

fn attr_name(name: &str) -> Result<&str, String> {
    let name = name.trim();
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
    {
        Ok(name)
    } else {
        Err(format!("unsupported attribute name '{}'", name))
    }
}

fn unquote(literal: &str) -> Result<String, String> {
    let mut chars = literal.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if open == close && (open == '\'' || open == '"') => {
            Ok(chars.as_str().to_string())
        }
        _ => Err(format!("expected a quoted string, found '{}'", literal)),
    }
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
