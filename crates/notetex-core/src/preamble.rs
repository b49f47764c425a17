//! LaTeX preamble for the callout environments
//!
//! Declares one `tcolorbox` environment per distinct environment name in a
//! [`CalloutConfig`], so a document using the rewritten callouts compiles
//! without hand-written definitions.

use std::collections::BTreeSet;

use crate::callout::CalloutConfig;

/// `\usepackage` line and `\newtcolorbox` declarations for `config`
pub fn preamble(config: &CalloutConfig) -> String {
    let environments: BTreeSet<&str> = config
        .environments()
        .map(|(_, env)| env)
        .chain(std::iter::once(config.default_environment()))
        .collect();

    let mut out = String::from("\\usepackage{tcolorbox}\n");
    for env in environments {
        out.push_str(&format!(
            "\\newtcolorbox{{{}}}{{title={}}}\n",
            env,
            environment_title(env)
        ));
    }
    out
}

/// Default box title: the environment name without a trailing `box`,
/// capitalized
fn environment_title(environment: &str) -> String {
    let stem = environment
        .strip_suffix("box")
        .filter(|stem| !stem.is_empty())
        .unwrap_or(environment);
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
