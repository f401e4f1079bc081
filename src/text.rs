//! Display-text values and conjugation.
//!
//! A rule's display text is a `TextSpec`: an ordered mix of literal fragments
//! and inflection objects. An inflection object holds every surface form of a
//! word; the concrete form is chosen only when the A* search renders the
//! path, using the conjugation contexts inherited from ancestor rules.
//!
//! The selection order is fixed: an explicit `grammatical_form` wins, then a
//! person-number (from a context, else the most recent subject terminal),
//! then an `accepted_tense` that matches the tense of the form actually
//! typed, then the default form.

use smol_str::SmolStr;
use std::fmt;
use std::rc::Rc;

/// Tense of a verb form, either as matched in the input or as accepted by a
/// parent rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tense {
    Present,
    Past,
}

/// Person-number agreement classes.
/// These get used often, so the variant names are kept short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonNumber {
    OneSg,
    ThreeSg,
    Pl,
}

/// A conjugation directive a rule applies to the verbs below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammaticalForm {
    Infinitive,
    Past,
}

/// All surface forms of an inflected word. `other` is the default and the
/// only required form; absent forms fall back to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Inflection {
    pub other: SmolStr,
    pub one_sg: Option<SmolStr>,
    pub three_sg: Option<SmolStr>,
    pub pl: Option<SmolStr>,
    pub past: Option<SmolStr>,
}

impl Inflection {
    pub fn plain(other: &str) -> Self {
        Self { other: SmolStr::new(other), ..Default::default() }
    }

    fn person(&self, pn: PersonNumber) -> SmolStr {
        let form = match pn {
            PersonNumber::OneSg => &self.one_sg,
            PersonNumber::ThreeSg => &self.three_sg,
            PersonNumber::Pl => &self.pl,
        };
        form.clone().unwrap_or_else(|| self.other.clone())
    }

    fn past(&self) -> SmolStr {
        self.past.clone().unwrap_or_else(|| self.other.clone())
    }
}

/// One element of a display-text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPart {
    Str(SmolStr),
    Inflected(Rc<Inflection>),
}

/// Ordered display text. Plain strings are kept merged; inflection objects
/// stay distinct so they can be conjugated at render time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextSpec(pub Vec<TextPart>);

impl TextSpec {
    pub fn literal(s: &str) -> Self {
        Self(vec![TextPart::Str(SmolStr::new(s))])
    }

    pub fn inflected(inf: Inflection) -> Self {
        Self(vec![TextPart::Inflected(Rc::new(inf))])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Concatenate two optional text values, merging adjacent plain strings
    /// into one fragment and keeping inflection objects as separate parts.
    pub fn concat(left: Option<&TextSpec>, right: Option<&TextSpec>) -> Option<TextSpec> {
        let mut parts: Vec<TextPart> = Vec::new();
        for spec in [left, right].into_iter().flatten() {
            for part in &spec.0 {
                match (parts.last_mut(), part) {
                    (Some(TextPart::Str(acc)), TextPart::Str(s)) => {
                        let mut merged = String::from(acc.as_str());
                        merged.push(' ');
                        merged.push_str(s);
                        *acc = SmolStr::new(merged);
                    }
                    _ => parts.push(part.clone()),
                }
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(TextSpec(parts))
        }
    }
}

impl fmt::Display for TextSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            match part {
                TextPart::Str(s) => write!(f, "{s}")?,
                TextPart::Inflected(inf) => write!(f, "{}", inf.other)?,
            }
        }
        Ok(())
    }
}

/// Conjugation properties a rule contributes to its subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConjContext {
    pub form: Option<GrammaticalForm>,
    pub accepted_tense: Option<Tense>,
    pub person_number: Option<PersonNumber>,
}

impl ConjContext {
    pub fn is_empty(&self) -> bool {
        self.form.is_none() && self.accepted_tense.is_none() && self.person_number.is_none()
    }
}

/// Choose the surface form of an inflected word.
///
/// `contexts` is ordered innermost-first. `subject` is the person-number of
/// the most recent subject terminal on the path; `matched` is the tense of
/// the form the speaker actually typed, if the terminal records one.
pub fn conjugate<'a, I>(
    inf: &Inflection,
    contexts: I,
    subject: Option<PersonNumber>,
    matched: Option<Tense>,
) -> SmolStr
where
    I: IntoIterator<Item = &'a ConjContext>,
{
    for ctx in contexts {
        if let Some(form) = ctx.form {
            return match form {
                GrammaticalForm::Past => inf.past(),
                GrammaticalForm::Infinitive => inf.other.clone(),
            };
        }
        if let Some(pn) = ctx.person_number {
            return inf.person(pn);
        }
        if ctx.accepted_tense == Some(Tense::Past) && matched == Some(Tense::Past) {
            return inf.past();
        }
    }
    if let Some(pn) = subject {
        return inf.person(pn);
    }
    inf.other.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like() -> Inflection {
        Inflection {
            other: SmolStr::new("like"),
            three_sg: Some(SmolStr::new("likes")),
            past: Some(SmolStr::new("liked")),
            ..Default::default()
        }
    }

    fn no_context() -> std::iter::Empty<&'static ConjContext> {
        std::iter::empty()
    }

    #[test]
    fn default_form_without_context() {
        assert_eq!(conjugate(&like(), no_context(), None, None), "like");
    }

    #[test]
    fn subject_person_number_selects_form() {
        assert_eq!(conjugate(&like(), no_context(), Some(PersonNumber::ThreeSg), None), "likes");
        // missing form falls back to the default
        assert_eq!(conjugate(&like(), no_context(), Some(PersonNumber::OneSg), None), "like");
    }

    #[test]
    fn grammatical_form_wins_over_subject() {
        let ctx = ConjContext { form: Some(GrammaticalForm::Past), ..Default::default() };
        assert_eq!(conjugate(&like(), [&ctx], Some(PersonNumber::ThreeSg), None), "liked");
    }

    #[test]
    fn accepted_tense_keeps_matched_past() {
        let ctx = ConjContext { accepted_tense: Some(Tense::Past), ..Default::default() };
        assert_eq!(
            conjugate(&like(), [&ctx], Some(PersonNumber::OneSg), Some(Tense::Past)),
            "liked"
        );
        // a present-tense match is not forced into the past
        assert_eq!(
            conjugate(&like(), [&ctx], Some(PersonNumber::OneSg), Some(Tense::Present)),
            "like"
        );
    }

    #[test]
    fn innermost_context_wins() {
        let inner = ConjContext { form: Some(GrammaticalForm::Infinitive), ..Default::default() };
        let outer = ConjContext { form: Some(GrammaticalForm::Past), ..Default::default() };
        assert_eq!(conjugate(&like(), [&inner, &outer], None, None), "like");
    }

    #[test]
    fn concat_merges_plain_strings() {
        let a = TextSpec::literal("pull");
        let b = TextSpec::literal("requests");
        let merged = TextSpec::concat(Some(&a), Some(&b)).unwrap();
        assert_eq!(merged.0.len(), 1);
        assert_eq!(merged.to_string(), "pull requests");
    }

    #[test]
    fn concat_preserves_inflections() {
        let a = TextSpec::literal("is");
        let b = TextSpec::inflected(like());
        let merged = TextSpec::concat(Some(&a), Some(&b)).unwrap();
        assert_eq!(merged.0.len(), 2);
    }
}
