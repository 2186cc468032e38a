//! Typed filter graph
//!
//! The graph is kept as data (`FilterChain` records with input pads, filters
//! and output pads) and only turned into FFmpeg's textual `-filter_complex`
//! syntax through `Display`.

use std::collections::HashSet;
use std::fmt;

/// Format a number the same way every time: at most six decimals, no trailing zeros
pub fn fmt_num(value: f64) -> String {
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// A named endpoint of a graph edge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pad {
    /// A stream of an encoder input, e.g. `0:v`
    Stream { input: usize, media: char },
    /// A label produced inside the graph, e.g. `v0` or `outv`
    Label(String),
}

impl Pad {
    pub fn video(input: usize) -> Self {
        Self::Stream { input, media: 'v' }
    }

    pub fn audio(input: usize) -> Self {
        Self::Stream { input, media: 'a' }
    }

    pub fn label<S: Into<String>>(name: S) -> Self {
        Self::Label(name.into())
    }

    /// Selector for `-map`: labels keep their brackets, input streams do not
    pub fn map_selector(&self) -> String {
        match self {
            Self::Stream { input, media } => format!("{}:{}", input, media),
            Self::Label(name) => format!("[{}]", name),
        }
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { input, media } => write!(f, "[{}:{}]", input, media),
            Self::Label(name) => write!(f, "[{}]", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Positional(String),
    Named(String, String),
}

/// One filter with its arguments, e.g. `scale=w=1280:h=720`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append an unnamed argument
    pub fn arg<V: ToString>(mut self, value: V) -> Self {
        self.args.push(FilterArg::Positional(value.to_string()));
        self
    }

    /// Append a `key=value` argument
    pub fn named<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.args.push(FilterArg::Named(key.into(), value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of a named argument
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            FilterArg::Named(k, v) if k == key => Some(v.as_str()),
            _ => None,
        })
    }
}

/// Quote values that contain characters with meaning in filter graph syntax
fn escape_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| matches!(c, ',' | ':' | ';' | '[' | ']' | ' ' | '\''));
    if !needs_quotes {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            match arg {
                FilterArg::Positional(value) => write!(f, "{}", escape_value(value))?,
                FilterArg::Named(key, value) => write!(f, "{}={}", key, escape_value(value))?,
            }
        }
        Ok(())
    }
}

/// A linear chain of filters from input pads to output pads
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<Pad>,
}

impl FilterChain {
    pub fn new(inputs: Vec<Pad>, filters: Vec<Filter>, outputs: Vec<Pad>) -> Self {
        Self {
            inputs,
            filters,
            outputs,
        }
    }

    /// Single input, single output chain
    pub fn linear(input: Pad, filters: Vec<Filter>, output: Pad) -> Self {
        Self::new(vec![input], filters, vec![output])
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{}", pad)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        for pad in &self.outputs {
            write!(f, "{}", pad)?;
        }
        Ok(())
    }
}

/// A full `-filter_complex` graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Every filter in the graph, in order
    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.chains.iter().flat_map(|chain| chain.filters.iter())
    }

    /// Number of filters with the given name
    pub fn count_filters(&self, name: &str) -> usize {
        self.filters().filter(|filter| filter.name() == name).count()
    }

    /// Labels produced by chains, in order of appearance
    pub fn output_labels(&self) -> Vec<&str> {
        self.chains
            .iter()
            .flat_map(|chain| chain.outputs.iter())
            .filter_map(|pad| match pad {
                Pad::Label(name) => Some(name.as_str()),
                Pad::Stream { .. } => None,
            })
            .collect()
    }

    /// Labels produced more than once
    pub fn duplicate_labels(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.output_labels()
            .into_iter()
            .filter(|label| !seen.insert(*label))
            .collect()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}
