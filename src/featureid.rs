//! Feature id module: groups `FEATUREID=` request tokens by feature type.

use crate::expr::PredicateNode;
use crate::FilterError;
use serde::{Serialize, Deserialize};

/// Ids addressed to one layer, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureIdGroup {
    pub layer: String,
    pub ids: Vec<String>,
}

impl FeatureIdGroup {
    /// FeatureId node carrying `layer.id` tokens, ready for the compilers.
    pub fn to_node(&self) -> PredicateNode {
        PredicateNode::FeatureId(self.ids.iter().map(|id| format!("{}.{}", self.layer, id)).collect())
    }
}

pub struct FeatureIdResolver;

impl FeatureIdResolver {
    /// Splits a comma separated `typename.id` list into per-layer groups.
    ///
    /// `layers` are the feature types named by the request. A bare id is only
    /// accepted when exactly one layer is targeted.
    pub fn resolve(raw: &str, layers: &[&str]) -> Result<Vec<FeatureIdGroup>, FilterError> {
        let mut groups: Vec<FeatureIdGroup> = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (layer, id) = match token.rsplit_once('.') {
                Some((prefix, id)) => {
                    let layer = match layers.iter().find(|l| l.eq_ignore_ascii_case(prefix)) {
                        Some(known) => *known,
                        None if layers.is_empty() => prefix,
                        None => {
                            return Err(FilterError::FeatureId(format!(
                                "feature id {} does not match any requested type name",
                                token
                            )))
                        }
                    };
                    (layer, id)
                }
                None => match layers {
                    [only] => (*only, token),
                    _ => {
                        return Err(FilterError::FeatureId(format!(
                            "feature id {} has no type name prefix",
                            token
                        )))
                    }
                },
            };
            match groups.iter_mut().find(|g| g.layer == layer) {
                Some(group) => group.ids.push(id.to_string()),
                None => groups.push(FeatureIdGroup { layer: layer.to_string(), ids: vec![id.to_string()] }),
            }
        }
        Ok(groups)
    }

    /// Renders a group as a Filter document of FeatureId elements.
    pub fn to_filter_xml(group: &FeatureIdGroup) -> String {
        let mut out = String::from("<Filter>");
        for id in &group.ids {
            out.push_str("<FeatureId fid=\"");
            push_escaped(&mut out, &group.layer);
            out.push('.');
            push_escaped(&mut out, id);
            out.push_str("\"/>");
        }
        out.push_str("</Filter>");
        out
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
}
