use regex_hybrid::{Match, Regex};

fn group_text<'t>(text: &'t str, m: &Match, index: usize) -> &'t str {
    let span = m.group(index).unwrap();
    &text[span.range()]
}

#[test]
fn plus_repetition_collects_the_longest_capture() {
    let mut re = Regex::new(b"a+").unwrap();
    assert!(re.test_anchored(b"aaab").unwrap());

    let text = "aaab";
    let matches = re.match_anchored(text.as_bytes()).unwrap();
    let last = matches.last().unwrap();
    assert_eq!("aaa", group_text(text, last, 0));
}

#[test]
fn nested_and_alternated_groups_with_emoji() {
    let pattern = "(a(b))(c|😊)(p|[😊d])";
    let text = "ab😊d";
    let mut re = Regex::new(pattern.as_bytes()).unwrap();
    assert!(re.test_anchored(text.as_bytes()).unwrap());

    let matches = re.match_anchored(text.as_bytes()).unwrap();
    let m = matches.last().unwrap();
    assert_eq!(text, group_text(text, m, 0));
    assert_eq!("ab", group_text(text, m, 1));
    assert_eq!("b", group_text(text, m, 2));
    assert_eq!("😊", group_text(text, m, 3));
    assert_eq!("d", group_text(text, m, 4));
}

#[test]
fn unanchored_existence_with_dot_star() {
    let mut re = Regex::new(b"f.*l ").unwrap();
    assert!(re.test_unanchored(b"...full ...fall ...").unwrap());
    assert!(!re.test_unanchored(b"...fun ...fun ...").unwrap());
}

#[test]
fn unanchored_class_match_inside_other_text() {
    let mut re = Regex::new(b"[a-z]+").unwrap();
    let text = "AbC";
    assert!(re.test_unanchored(text.as_bytes()).unwrap());

    let matches = re.match_unanchored(text.as_bytes()).unwrap();
    let last = matches.last().unwrap();
    assert_eq!("b", group_text(text, last, 0));
}

#[test]
fn starred_group_reports_its_last_iteration() {
    let mut re = Regex::new(b"(a|b)*c").unwrap();
    let text = "ababac";
    let matches = re.match_anchored(text.as_bytes()).unwrap();
    let m = matches.last().unwrap();
    assert_eq!("ababac", group_text(text, m, 0));
    assert_eq!("a", group_text(text, m, 1));
}

#[test]
fn unmatched_open_paren_fails_to_compile() {
    let err = Regex::new(b"(ab").unwrap_err();
    assert!(err.is_invalid_pattern());
}

#[test]
fn existence_test_agrees_with_submatch_extraction() {
    let cases: &[(&str, &[&str])] = &[
        ("(a|b)*c", &["abac", "c", "", "zzabaczz", "ababab", "😊c"]),
        ("a+b", &["ab", "aab", "aaab", "ba", "b", "xxaabyy"]),
        ("f.*l ", &["full ", "f l", "...fall ...", ""]),
        ("[a-z]+", &["AbC", "ABC", "abc", "123"]),
        ("(😊|p)d", &["😊d", "pd", "d", "x😊dy"]),
    ];
    for &(pattern, texts) in cases {
        let mut re = Regex::new(pattern.as_bytes()).unwrap();
        for text in texts {
            let tested = re.test_unanchored(text.as_bytes()).unwrap();
            let matched =
                !re.match_unanchored(text.as_bytes()).unwrap().is_empty();
            assert_eq!(
                tested, matched,
                "pattern {:?} text {:?}",
                pattern, text,
            );
        }
    }
}

#[test]
fn empty_pattern_matches_any_text_at_position_zero() {
    let mut re = Regex::new(b"").unwrap();
    assert!(re.test_anchored(b"").unwrap());
    assert!(re.test_anchored(b"anything").unwrap());
    assert!(re.test_unanchored(b"anything").unwrap());

    let matches = re.match_anchored(b"xy").unwrap();
    let m = matches.first().unwrap();
    assert_eq!((0, 0), (m.span().start, m.span().end));
}

#[test]
fn empty_input_with_anchored_test() {
    let mut re = Regex::new(b"a").unwrap();
    assert!(!re.test_anchored(b"").unwrap());
    let mut re = Regex::new(b"a?").unwrap();
    assert!(re.test_anchored(b"").unwrap());
}

#[test]
fn emoji_patterns_behave_like_ascii_ones() {
    let mut ascii = Regex::new(b"(x)+y").unwrap();
    let mut emoji = Regex::new("(😊)+y".as_bytes()).unwrap();
    assert!(ascii.test_anchored(b"xxy").unwrap());
    assert!(emoji.test_anchored("😊😊y".as_bytes()).unwrap());
    assert!(!emoji.test_anchored("😀y".as_bytes()).unwrap());

    let text = "😊😊y";
    let matches = emoji.match_anchored(text.as_bytes()).unwrap();
    let m = matches.last().unwrap();
    assert_eq!("😊😊y", group_text(text, m, 0));
    assert_eq!("😊", group_text(text, m, 1));
    assert_eq!((4, 8), {
        let span = m.group(1).unwrap();
        (span.start, span.end)
    });
}

#[test]
fn escaped_operators_are_literals() {
    let mut re = Regex::new(br"a\*b").unwrap();
    assert!(re.test_anchored(b"a*b").unwrap());
    assert!(!re.test_anchored(b"aab").unwrap());
    let mut re = Regex::new(br"\(a\)").unwrap();
    assert!(re.test_anchored(b"(a)").unwrap());
}

#[test]
fn dot_matches_any_codepoint() {
    let mut re = Regex::new(b"a.c").unwrap();
    assert!(re.test_anchored(b"abc").unwrap());
    assert!(re.test_anchored("a😊c".as_bytes()).unwrap());
    assert!(!re.test_anchored(b"ac").unwrap());
}

#[test]
fn class_range_boundaries() {
    let mut re = Regex::new(b"[A-Z0-9]+").unwrap();
    assert!(re.test_anchored(b"A9Z0").unwrap());
    assert!(!re.test_unanchored(b"az").unwrap());
}

#[test]
fn tiny_cache_answers_match_the_default_cache() {
    let patterns = ["(a|b)+c", "f.*l ", "[a-z]+d", "(x(y))z*"];
    let texts = [
        "abababc",
        "zzzfull zzz",
        "worldd",
        "xyzzz",
        "",
        "ab😊ba",
        "dddd",
    ];
    for pattern in patterns {
        let mut small = Regex::builder()
            .hybrid(Regex::config().cache_capacity(2).overflow_limit(1))
            .build(pattern.as_bytes())
            .unwrap();
        let mut big = Regex::new(pattern.as_bytes()).unwrap();
        for text in texts {
            assert_eq!(
                big.test_anchored(text.as_bytes()).unwrap(),
                small.test_anchored(text.as_bytes()).unwrap(),
                "anchored, pattern {:?} text {:?}",
                pattern,
                text,
            );
            assert_eq!(
                big.test_unanchored(text.as_bytes()).unwrap(),
                small.test_unanchored(text.as_bytes()).unwrap(),
                "unanchored, pattern {:?} text {:?}",
                pattern,
                text,
            );
        }
    }
}

#[test]
fn repeated_searches_are_stable() {
    let mut re = Regex::new(b"(a|b)*abb").unwrap();
    for _ in 0..8 {
        assert!(re.test_unanchored(b"zzabbabbzz").unwrap());
        assert!(!re.test_anchored(b"zzz").unwrap());
    }
}

#[test]
fn nul_bytes_in_text_are_literals() {
    // The tokenizer strips NUL from patterns, but searched text keeps
    // them: '.' consumes a NUL like any other codepoint.
    let mut re = Regex::new(b"a.b").unwrap();
    assert!(re.test_anchored(b"a\0b").unwrap());
}
