//! Debug renderings: the packed forest as text or graphviz, the
//! graph-structured stack (see `Parser::format_stack`), and parse-tree
//! outlines for emitted results.

use crate::forest::{Forest, NodeId, SubId, SubProps};
use crate::grammar::Grammar;
use indextree::Arena;
use itertools::Itertools;
use string_builder::Builder;

/// One line per packed node, one indented line per alternative sub.
pub fn format_forest(forest: &Forest, grammar: &Grammar) -> String {
    let mut b = Builder::default();
    for (_, node) in forest.nodes() {
        if node.is_leaf() {
            continue;
        }
        b.append(format!(
            "{} {}..{}{}\n",
            grammar.name(node.symbol),
            node.start,
            node.end(),
            match node.min_cost {
                Some(min) => format!(" min={min}"),
                None => String::new(),
            }
        ));
        for &sid in &node.subs {
            let sub = forest.sub(sid);
            let children = std::iter::once(sub.node)
                .chain(sub.next)
                .map(|c| {
                    let cd = forest.node(c);
                    format!("{} {}..{}", grammar.name(cd.symbol), cd.start, cd.end())
                })
                .join(" + ");
            let kind = match &sub.props {
                SubProps::Flat(f) => match &f.text {
                    Some(text) => format!("flat \"{text}\""),
                    None => "flat".to_string(),
                },
                SubProps::Rules(list) if list.len() > 1 => {
                    format!("rule x{}", list.len())
                }
                SubProps::Rules(_) => "rule".to_string(),
            };
            b.append(format!(
                "  <- {children} ({kind}{})\n",
                match sub.min_cost {
                    Some(min) => format!(", min={min}"),
                    None => String::new(),
                }
            ));
        }
    }
    b.string().unwrap_or_default()
}

/// The forest as a graphviz digraph; binary subs fan out to both children.
pub fn format_forest_graph(forest: &Forest, grammar: &Grammar) -> String {
    let mut b = Builder::default();
    b.append("digraph forest {\n");
    b.append("  rankdir=BT;\n");
    for (nid, node) in forest.nodes() {
        let shape = if node.is_leaf() { "plaintext" } else { "box" };
        b.append(format!(
            "  n{} [label=\"{} {}..{}\" shape={shape}];\n",
            nid.0,
            grammar.name(node.symbol),
            node.start,
            node.end()
        ));
    }
    for (nid, node) in forest.nodes() {
        for &sid in &node.subs {
            let sub = forest.sub(sid);
            b.append(format!("  n{} -> n{} [label=\"s{}\"];\n", sub.node.0, nid.0, sid.0));
            if let Some(second) = sub.next {
                b.append(format!(
                    "  n{} -> n{} [label=\"s{}\" style=dashed];\n",
                    second.0, nid.0, sid.0
                ));
            }
        }
    }
    b.append("}\n");
    b.string().unwrap_or_default()
}

/// Render one result's derivation trail as an indented outline. The trail
/// is the pre-order list of (node, chosen sub) pairs the search committed
/// to; arity comes from the chosen sub, so the tree rebuilds without
/// re-searching the forest.
pub fn format_tree(
    forest: &Forest,
    grammar: &Grammar,
    trail: &[(NodeId, SubId)],
    node_costs: bool,
    token_ranges: bool,
) -> String {
    let mut arena: Arena<String> = Arena::new();
    let mut root = None;
    let mut open: Vec<(indextree::NodeId, usize)> = Vec::new();

    for &(nid, sid) in trail {
        let node = forest.node(nid);
        let sub = forest.sub(sid);
        let mut label = grammar.name(node.symbol).to_string();
        if token_ranges {
            label.push_str(&format!(" {}..{}", node.start, node.end()));
        }
        if node_costs {
            if let Some(min) = node.min_cost {
                label.push_str(&format!(" min={min}"));
            }
        }
        let slots = match &sub.props {
            SubProps::Flat(f) => {
                if let Some(text) = &f.text {
                    label.push_str(&format!(" \"{text}\""));
                }
                0
            }
            SubProps::Rules(_) => 1 + usize::from(sub.next.is_some()),
        };

        let tree_node = arena.new_node(label);
        match open.last_mut() {
            Some((parent, remaining)) => {
                parent.append(tree_node, &mut arena);
                *remaining -= 1;
            }
            None => root = Some(tree_node),
        }
        if slots > 0 {
            open.push((tree_node, slots));
        } else {
            while matches!(open.last(), Some((_, 0))) {
                open.pop();
            }
        }
    }

    let mut b = Builder::default();
    if let Some(root) = root {
        render_outline(&arena, root, 0, &mut b);
    }
    b.string().unwrap_or_default()
}

fn render_outline(arena: &Arena<String>, node: indextree::NodeId, depth: usize, b: &mut Builder) {
    if let Some(data) = arena.get(node) {
        b.append("  ".repeat(depth));
        b.append(data.get().as_str());
        b.append("\n");
    }
    for child in node.children(arena) {
        render_outline(arena, child, depth + 1, b);
    }
}
