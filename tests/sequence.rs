use kira_protein_report::sequence::{
    ClusterFeature, Location, best_member, chunk_sequence, extract_region,
    longest_common_substring, mapped_length,
};

fn member(spans: &[(usize, usize)], group: &str) -> ClusterFeature {
    ClusterFeature {
        locations: spans
            .iter()
            .map(|&(start, end)| Location { start, end })
            .collect(),
        interpro_group_id: Some(group.to_string()),
    }
}

#[test]
fn lcs_is_symmetric() {
    let pairs = [
        ("ABCBDAB", "BDCABA"),
        ("MEEPQSDPSV", "PQSDP"),
        ("", "ABC"),
        ("GATTACA", "TACAGAT"),
    ];
    for (a, b) in pairs {
        assert_eq!(longest_common_substring(a, b), longest_common_substring(b, a));
    }
}

#[test]
fn lcs_of_self_is_length() {
    for text in ["", "A", "MEEPQSDPSVEPPLSQ", "AAAA"] {
        assert_eq!(longest_common_substring(text, text), text.chars().count());
    }
}

#[test]
fn lcs_counts_contiguous_runs_only() {
    assert_eq!(longest_common_substring("ABCBDAB", "BDCABA"), 2);
    assert_eq!(longest_common_substring("XXMEEPQYY", "ZMEEPQZ"), 5);
    assert_eq!(longest_common_substring("ABC", "XYZ"), 0);
}

#[test]
fn chunking_keeps_remainder() {
    let sequence = "A".repeat(150);
    let chunks = chunk_sequence(&sequence, 70);
    assert_eq!(
        chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
        vec![70, 70, 10]
    );
    assert!(chunk_sequence("", 70).is_empty());
}

#[test]
fn best_member_prefers_longest_then_first() {
    let features = vec![
        member(&[(1, 4), (10, 12)], "IPR1"),
        member(&[(5, 10)], "IPR2"),
        member(&[(20, 25)], "IPR3"),
    ];
    assert_eq!(mapped_length(&features[0].locations), 5);
    let best = best_member(&features).unwrap();
    assert_eq!(best.interpro_group_id.as_deref(), Some("IPR1"));
    assert!(best_member(&[]).is_none());
}

#[test]
fn region_uses_one_based_inclusive_spans() {
    let region = extract_region("ABCDEFGHIJKLMNOP", &[Location { start: 5, end: 10 }]);
    assert_eq!(region, "EFGHIJ");

    let spans = [Location { start: 1, end: 2 }, Location { start: 15, end: 40 }];
    assert_eq!(extract_region("ABCDEFGHIJKLMNOP", &spans), "ABOP");
}
