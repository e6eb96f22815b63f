//! The shared cascade executor. Every selector cascade in the engine
//! follows one policy: evaluate sources in a fixed priority order, stop
//! at the first source that yields at least one qualifying match, never
//! merge partial matches across sources.

/// Evaluate `sources` in order; return the index of the first source
/// whose evaluation yields any matches, together with those matches.
pub fn cascade<S, T>(sources: &[S], mut eval: impl FnMut(&S) -> Vec<T>) -> Option<(usize, Vec<T>)> {
    for (idx, source) in sources.iter().enumerate() {
        let matches = eval(source);
        if !matches.is_empty() {
            return Some((idx, matches));
        }
    }
    None
}

/// Like [`cascade`] but a source must clear `min_matches` to count as
/// self-sufficient. Used where low-confidence sources produce noise in
/// ones and twos.
pub fn cascade_min<S, T>(
    sources: &[S],
    min_matches: impl Fn(&S) -> usize,
    mut eval: impl FnMut(&S) -> Vec<T>,
) -> Option<(usize, Vec<T>)> {
    for (idx, source) in sources.iter().enumerate() {
        let matches = eval(source);
        if !matches.is_empty() && matches.len() >= min_matches(source) {
            return Some((idx, matches));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_nonempty_source_wins() {
        let sources = ["a", "b", "c"];
        let result = cascade(&sources, |s| match *s {
            "b" => vec![1, 2],
            "c" => vec![3],
            _ => vec![],
        });
        assert_eq!(result, Some((1, vec![1, 2])));
    }

    #[test]
    fn later_sources_never_merged() {
        let sources = ["a", "b"];
        let result = cascade(&sources, |s| match *s {
            "a" => vec![1],
            _ => vec![2, 3],
        });
        assert_eq!(result, Some((0, vec![1])));
    }

    #[test]
    fn empty_cascade_is_none() {
        let sources = ["a", "b"];
        assert_eq!(cascade(&sources, |_| Vec::<u32>::new()), None);
    }

    #[test]
    fn min_matches_disqualifies_thin_sources() {
        let sources = [("a", 3usize), ("b", 1usize)];
        let result = cascade_min(
            &sources,
            |s| s.1,
            |s| match s.0 {
                "a" => vec![1, 2],
                _ => vec![9],
            },
        );
        // "a" yields two matches but needs three, so "b" wins.
        assert_eq!(result, Some((1, vec![9])));
    }
}
