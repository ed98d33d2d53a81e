//! Operation name resolution.
//!
//! The registered name namespaces a query's cache keys and is what triggers
//! match mutations by, so it has to be unambiguous. A plain `fn` item
//! carries an intrinsic name (the final segment of its type path); closures
//! and function pointers are anonymous and need an explicit override.

use crate::error::RegistrationError;

/// Intrinsic name of a callable's type, if it has one.
///
/// Returns `None` for closures (`{{closure}}` segments), function pointers
/// (`fn(..)` spellings), and generic instantiations, all of which are
/// treated as anonymous.
pub(crate) fn intrinsic_name<F>() -> Option<String> {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") {
        return None;
    }
    let last = full.rsplit("::").next()?;
    if last.is_empty() || last.contains('(') || last.contains('<') || last.contains(' ') {
        return None;
    }
    Some(last.to_string())
}

/// Resolve the name to register a callable under.
///
/// An explicit override that differs from an existing intrinsic name is an
/// ambiguous declaration and is rejected rather than silently preferred;
/// with neither available there is nothing to register under.
pub(crate) fn resolve_name<F>(explicit: Option<&str>) -> Result<String, RegistrationError> {
    match (intrinsic_name::<F>(), explicit) {
        (Some(intrinsic), Some(explicit)) if intrinsic != explicit => {
            Err(RegistrationError::ambiguous_name(intrinsic, explicit))
        }
        (_, Some(explicit)) => Ok(explicit.to_string()),
        (Some(intrinsic), None) => Ok(intrinsic),
        (None, None) => Err(RegistrationError::MissingName),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_recipes() {}

    fn intrinsic_of<F>(_f: &F) -> Option<String> {
        intrinsic_name::<F>()
    }

    fn resolve_of<F>(_f: &F, explicit: Option<&str>) -> Result<String, RegistrationError> {
        resolve_name::<F>(explicit)
    }

    #[test]
    fn fn_items_have_intrinsic_names() {
        assert_eq!(intrinsic_of(&get_recipes).as_deref(), Some("get_recipes"));
    }

    #[test]
    fn closures_are_anonymous() {
        let anonymous = |x: u32| x + 1;
        assert_eq!(intrinsic_of(&anonymous), None);
    }

    #[test]
    fn function_pointers_are_anonymous() {
        let pointer: fn() = get_recipes;
        assert_eq!(intrinsic_of(&pointer), None);
    }

    #[test]
    fn explicit_name_covers_anonymous_logic() {
        let anonymous = |x: u32| x + 1;
        let name = resolve_of(&anonymous, Some("increment")).expect("explicit name");
        assert_eq!(name, "increment");
    }

    #[test]
    fn matching_explicit_and_intrinsic_agree() {
        let name = resolve_of(&get_recipes, Some("get_recipes")).expect("matching names");
        assert_eq!(name, "get_recipes");
    }

    #[test]
    fn conflicting_names_are_rejected() {
        let error = resolve_of(&get_recipes, Some("fetch_recipes")).expect_err("conflict");
        assert!(matches!(
            error,
            RegistrationError::AmbiguousName { intrinsic, explicit }
                if intrinsic == "get_recipes" && explicit == "fetch_recipes"
        ));
    }

    #[test]
    fn unnamed_anonymous_logic_is_rejected() {
        let anonymous = |x: u32| x + 1;
        let error = resolve_of(&anonymous, None).expect_err("missing name");
        assert!(matches!(error, RegistrationError::MissingName));
    }
}
