//! Locator descriptors
//!
//! A [`LocatorDescriptor`] names one way of finding a DOM node. Descriptors
//! are plain data: ranking and relative-form conversion never touch the browser.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::webdriver::LocatorStrategy;

/// One way of locating an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorDescriptor {
    /// Locator strategy
    pub strategy: LocatorStrategy,
    /// Strategy-specific value
    pub value: String,
    /// Rank within [`rank_best`]; lower wins
    pub priority: u8,
}

impl LocatorDescriptor {
    /// Create a descriptor; its priority follows from the strategy
    pub fn new<S: Into<String>>(strategy: LocatorStrategy, value: S) -> Self {
        Self {
            strategy,
            value: value.into(),
            priority: priority_of(strategy),
        }
    }

    pub fn id<S: Into<String>>(value: S) -> Self {
        Self::new(LocatorStrategy::Id, value)
    }

    pub fn class_name<S: Into<String>>(value: S) -> Self {
        Self::new(LocatorStrategy::ClassName, value)
    }

    pub fn css<S: Into<String>>(value: S) -> Self {
        Self::new(LocatorStrategy::CssSelector, value)
    }

    pub fn xpath<S: Into<String>>(value: S) -> Self {
        Self::new(LocatorStrategy::XPath, value)
    }

    /// Same locator with positional qualifiers stripped, see [`to_relative`]
    pub fn to_relative(&self) -> Self {
        to_relative(self)
    }
}

impl fmt::Display for LocatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy, self.value)
    }
}

/// Fixed rank of a strategy: Id > ClassName > XPath > CssSelector > Name > TagName > LinkText
pub fn priority_of(strategy: LocatorStrategy) -> u8 {
    match strategy {
        LocatorStrategy::Id => 0,
        LocatorStrategy::ClassName => 1,
        LocatorStrategy::XPath => 2,
        LocatorStrategy::CssSelector => 3,
        LocatorStrategy::Name => 4,
        LocatorStrategy::TagName => 5,
        LocatorStrategy::LinkText => 6,
    }
}

/// Highest-ranked descriptor; ties keep the first one given
pub fn rank_best(descriptors: &[LocatorDescriptor]) -> Option<&LocatorDescriptor> {
    descriptors
        .iter()
        .enumerate()
        .min_by_key(|(index, d)| (priority_of(d.strategy), *index))
        .map(|(_, d)| d)
}

fn css_positional() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r":(?:nth-child|nth-of-type)\(\s*\d+\s*\)|:(?:first|last)-(?:child|of-type)")
            .expect("positional CSS pattern is a valid regex")
    })
}

fn css_child_combinator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*>\s*").expect("combinator pattern is a valid regex"))
}

fn xpath_index() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+\]").expect("index pattern is a valid regex"))
}

/// Strip positional qualifiers so the locator matches a class of elements
///
/// CSS loses `:nth-child(n)`, `:nth-of-type(n)`, `:first-child`, `:last-child`
/// (and the `-of-type` forms); XPath loses `[n]` predicates and an absolute
/// `/html/body/` prefix. The strategy is never changed, and applying the
/// conversion to its own output returns it unchanged.
pub fn to_relative(descriptor: &LocatorDescriptor) -> LocatorDescriptor {
    let value = match descriptor.strategy {
        LocatorStrategy::CssSelector => relative_css(&descriptor.value),
        LocatorStrategy::XPath => relative_xpath(&descriptor.value),
        _ => descriptor.value.clone(),
    };

    LocatorDescriptor {
        strategy: descriptor.strategy,
        value,
        priority: descriptor.priority,
    }
}

/// Split a selector into runs outside and inside attribute brackets
///
/// Quoted text inside a bracket may itself contain `]`.
fn css_runs(selector: &str) -> Vec<(bool, String)> {
    let mut runs: Vec<(bool, String)> = Vec::new();
    let mut in_bracket = false;
    let mut quote: Option<char> = None;
    let mut current = String::new();

    for c in selector.chars() {
        match (in_bracket, quote, c) {
            (false, _, '[') => {
                runs.push((true, std::mem::take(&mut current)));
                in_bracket = true;
                current.push(c);
            }
            (true, None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (true, Some(q), _) if c == q => {
                quote = None;
                current.push(c);
            }
            (true, None, ']') => {
                current.push(c);
                runs.push((false, std::mem::take(&mut current)));
                in_bracket = false;
            }
            _ => current.push(c),
        }
    }
    runs.push((!in_bracket, current));
    runs
}

fn relative_css(selector: &str) -> String {
    let mut relative: String = css_runs(selector)
        .into_iter()
        .map(|(outside, run)| {
            if outside {
                let stripped = css_positional().replace_all(&run, "");
                css_child_combinator().replace_all(&stripped, " > ").into_owned()
            } else {
                run
            }
        })
        .collect::<String>()
        .trim()
        .to_string();

    // A combinator whose right side was purely positional
    if relative.ends_with('>') {
        relative.push_str(" *");
    }
    if relative.is_empty() {
        relative.push('*');
    }
    relative
}

fn relative_xpath(path: &str) -> String {
    let stripped = xpath_index().replace_all(path.trim(), "").to_string();

    if stripped.starts_with("//") {
        return stripped;
    }

    let relative = match stripped.strip_prefix("/html/body/") {
        Some(rest) => format!("//{}", rest),
        None => stripped,
    };

    if relative.contains("//") {
        return relative;
    }

    match relative.rsplit('/').find(|segment| !segment.is_empty()) {
        Some(last) => format!("//{}", last),
        None => relative,
    }
}
