//! The semantic algebra.
//!
//! A query's meaning is a tree of named functions over named arguments, e.g.
//! `repositories(repositories-liked(me))`. Rules carry either a *reduced*
//! semantic (a complete tree, merged into the enclosing scope as a sibling)
//! or an *unreduced* one (a function head still waiting for the arguments
//! its subtree will produce).
//!
//! Merging is where contradictions surface: nesting the same
//! forbid-multiple function twice, or placing two trees with the same
//! forbid-multiple root side by side, makes the path meaningless. Those
//! merges return a [`SemanticConflict`] and the search treats it exactly
//! like an impossible cost.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use smol_str::SmolStr;
use std::fmt;
use std::rc::Rc;
use string_builder::Builder;

/// The definition of a semantic function: its name, intrinsic cost, arity
/// bounds, and whether two instances of it may ever be siblings or nested.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticFunc {
    pub name: SmolStr,
    pub cost: f64,
    pub min_params: usize,
    pub max_params: usize,
    pub forbids_multiple: bool,
}

impl SemanticFunc {
    pub fn new(name: &str, min_params: usize, max_params: usize) -> Rc<Self> {
        Rc::new(Self {
            name: SmolStr::new(name),
            cost: 0.0,
            min_params,
            max_params,
            forbids_multiple: false,
        })
    }
}

/// A semantic tree: a function application or a bare argument leaf.
#[derive(Debug, Clone)]
pub enum Semantic {
    Func(Rc<SemanticFunc>, Vec<Semantic>),
    Arg(SmolStr),
}

/// How a rule contributes semantics: a finished tree, or a function head
/// awaiting the arguments reduced from its subtree.
#[derive(Debug, Clone)]
pub enum SemanticSpec {
    Reduced(Semantic),
    Unreduced(Rc<SemanticFunc>),
}

/// A merge or reduction that would produce a contradictory meaning.
/// Carries the name of the offending function for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticConflict {
    pub name: SmolStr,
}

impl fmt::Display for SemanticConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contradictory semantic: {}", self.name)
    }
}

impl PartialEq for Semantic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Semantic::Arg(a), Semantic::Arg(b)) => a == b,
            (Semantic::Func(fa, aa), Semantic::Func(fb, ab)) => fa.name == fb.name && aa == ab,
            _ => false,
        }
    }
}

impl Semantic {
    pub fn arg(name: &str) -> Self {
        Semantic::Arg(SmolStr::new(name))
    }

    /// The function or argument name at the root of this tree.
    pub fn root_name(&self) -> &SmolStr {
        match self {
            Semantic::Func(def, _) => &def.name,
            Semantic::Arg(name) => name,
        }
    }

    fn root_forbids_multiple(&self) -> bool {
        matches!(self, Semantic::Func(def, _) if def.forbids_multiple)
    }

    /// Total intrinsic cost of every function in the tree.
    pub fn cost(&self) -> f64 {
        match self {
            Semantic::Arg(_) => 0.0,
            Semantic::Func(def, args) => def.cost + args.iter().map(Semantic::cost).sum::<f64>(),
        }
    }

    fn write_canonical(&self, b: &mut Builder) {
        match self {
            Semantic::Arg(name) => b.append(name.as_str()),
            Semantic::Func(def, args) => {
                b.append(def.name.as_str());
                b.append("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        b.append(",");
                    }
                    arg.write_canonical(b);
                }
                b.append(")");
            }
        }
    }
}

impl fmt::Display for Semantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b = Builder::default();
        self.write_canonical(&mut b);
        write!(f, "{}", b.string().unwrap_or_default())
    }
}

impl Serialize for Semantic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Semantic::Arg(name) => serializer.serialize_str(name),
            Semantic::Func(def, args) => {
                let mut s = serializer.serialize_struct("Semantic", 2)?;
                s.serialize_field("name", def.name.as_str())?;
                s.serialize_field("args", args)?;
                s.end()
            }
        }
    }
}

/// Stable serialization of a sibling list, used for display and as the
/// deduplication key of completed parses.
pub fn canonical_string(sems: &[Semantic]) -> String {
    let mut b = Builder::default();
    for (i, sem) in sems.iter().enumerate() {
        if i > 0 {
            b.append(",");
        }
        sem.write_canonical(&mut b);
    }
    b.string().unwrap_or_default()
}

/// Apply a function head to the arguments collected from its subtree.
/// Argument order is the order the arguments were reduced in.
pub fn reduce(def: &Rc<SemanticFunc>, args: Vec<Semantic>) -> Result<Semantic, SemanticConflict> {
    if args.len() < def.min_params || args.len() > def.max_params {
        return Err(SemanticConflict { name: def.name.clone() });
    }
    if def.forbids_multiple {
        // nesting the same forbid-multiple function is contradictory
        for arg in &args {
            if arg.root_name() == &def.name {
                return Err(SemanticConflict { name: def.name.clone() });
            }
        }
    }
    Ok(Semantic::Func(Rc::clone(def), args))
}

/// Merge a reduced semantic into a sibling list. An exact duplicate is
/// idempotent unless its root forbids multiple instances; a distinct sibling
/// with the same forbid-multiple root is a contradiction.
pub fn merge_into(args: &mut Vec<Semantic>, new: Semantic) -> Result<(), SemanticConflict> {
    for existing in args.iter() {
        if *existing == new {
            return if new.root_forbids_multiple() {
                Err(SemanticConflict { name: new.root_name().clone() })
            } else {
                Ok(())
            };
        }
        if new.root_forbids_multiple() && existing.root_name() == new.root_name() {
            return Err(SemanticConflict { name: new.root_name().clone() });
        }
    }
    args.push(new);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forbidding(name: &str) -> Rc<SemanticFunc> {
        Rc::new(SemanticFunc {
            name: SmolStr::new(name),
            cost: 0.0,
            min_params: 1,
            max_params: 2,
            forbids_multiple: true,
        })
    }

    #[test]
    fn canonical_form_nests() {
        let inner = reduce(&SemanticFunc::new("repositories-liked", 1, 1), vec![Semantic::arg("me")])
            .unwrap();
        let outer = reduce(&SemanticFunc::new("repositories", 1, 1), vec![inner]).unwrap();
        assert_eq!(canonical_string(&[outer]), "repositories(repositories-liked(me))");
    }

    #[test]
    fn reduce_checks_arity() {
        let def = SemanticFunc::new("followers", 1, 1);
        assert!(reduce(&def, vec![]).is_err());
        assert!(reduce(&def, vec![Semantic::arg("me"), Semantic::arg("me")]).is_err());
    }

    #[test]
    fn duplicate_merge_is_idempotent() {
        let def = SemanticFunc::new("users-followed", 1, 1);
        let sem = reduce(&def, vec![Semantic::arg("me")]).unwrap();
        let mut args = vec![sem.clone()];
        merge_into(&mut args, sem).unwrap();
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn forbid_multiple_duplicate_conflicts() {
        let def = forbidding("users-gender");
        let sem = reduce(&def, vec![Semantic::arg("male")]).unwrap();
        let mut args = vec![sem.clone()];
        assert!(merge_into(&mut args, sem).is_err());
    }

    #[test]
    fn forbid_multiple_sibling_conflicts() {
        let def = forbidding("users-gender");
        let a = reduce(&def, vec![Semantic::arg("male")]).unwrap();
        let b = reduce(&def, vec![Semantic::arg("female")]).unwrap();
        let mut args = vec![a];
        assert!(merge_into(&mut args, b).is_err());
    }

    #[test]
    fn forbid_multiple_nesting_conflicts() {
        let def = forbidding("users-gender");
        let inner = reduce(&def, vec![Semantic::arg("male")]).unwrap();
        assert!(reduce(&def, vec![inner]).is_err());
    }

    #[test]
    fn cost_sums_over_tree() {
        let costly = Rc::new(SemanticFunc {
            name: SmolStr::new("users"),
            cost: 0.5,
            min_params: 1,
            max_params: 1,
            forbids_multiple: false,
        });
        let sem = reduce(&costly, vec![Semantic::arg("me")]).unwrap();
        assert!((sem.cost() - 0.5).abs() < f64::EPSILON);
    }
}
