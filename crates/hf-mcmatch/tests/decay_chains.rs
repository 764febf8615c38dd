//! End-to-end matching over hand-built decay chains.

use hf_core::Error;
use hf_core::pdg::{
    B_QUARK, D_PLUS, DELTA_PLUS_PLUS, K_PLUS, K_STAR_0, LAMBDA_1520, LAMBDA_C_PLUS, PI_PLUS,
    PROTON, XI_C_PLUS,
};
use hf_mcmatch::{
    DecayMatcher, DecayType, MAX_ANCESTRY_DEPTH, MatchResult, McParticle, McRecord,
    McRecordBuilder, OriginType,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Indices of a built chain.
struct Chain {
    record: McRecord,
    parent: usize,
    prongs: [usize; 3],
}

/// `ancestors` from the top down, then `parent → p K π` with every code times `sign`.
fn direct_decay(ancestors: &[i32], parent: i32, sign: i32) -> Chain {
    let mut b = McRecordBuilder::new();
    let mut above = None;
    for &code in ancestors {
        above = Some(b.push(code, above));
    }
    let lc = b.push(sign * parent, above);
    let p = b.push(sign * PROTON, Some(lc));
    let k = b.push(-sign * K_PLUS, Some(lc));
    let pi = b.push(sign * PI_PLUS, Some(lc));
    Chain { record: b.build().unwrap(), parent: lc, prongs: [p, k, pi] }
}

/// `Λc → (bachelor, resonance)`, resonance → two of the prongs.
fn resonant_decay(bachelor: i32, resonance: i32, products: [i32; 2], sign: i32) -> Chain {
    let mut b = McRecordBuilder::new();
    let lc = b.push(sign * LAMBDA_C_PLUS, None);
    let bach = b.push(sign * bachelor, Some(lc));
    let res = b.push(sign * resonance, Some(lc));
    let d1 = b.push(sign * products[0], Some(res));
    let d2 = b.push(sign * products[1], Some(res));
    Chain { record: b.build().unwrap(), parent: lc, prongs: [bach, d1, d2] }
}

fn links(prongs: [usize; 3]) -> [Option<usize>; 3] {
    prongs.map(Some)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn direct_lambda_c_is_prompt_without_channel() {
    let c = direct_decay(&[], LAMBDA_C_PLUS, 1);
    let m = DecayMatcher::default();

    let rec = m.match_reconstructed(&c.record, links(c.prongs));
    assert_eq!(rec, MatchResult { flag: 2, origin: OriginType::Prompt as i8, channel: 0 });
    assert_eq!(rec.decay_type(), Some(DecayType::LcToPKPi));

    assert_eq!(m.match_generated(&c.record, c.parent), rec);
}

#[test]
fn resonant_sub_channels_are_tagged() {
    let m = DecayMatcher::default();
    let cases = [
        (PROTON, K_STAR_0, [-K_PLUS, PI_PLUS], 1),
        (-K_PLUS, DELTA_PLUS_PLUS, [PROTON, PI_PLUS], 2),
        (PI_PLUS, LAMBDA_1520, [PROTON, -K_PLUS], 3),
    ];
    for (bachelor, resonance, products, channel) in cases {
        let c = resonant_decay(bachelor, resonance, products, 1);
        let rec = m.match_reconstructed(&c.record, links(c.prongs));
        assert_eq!(rec, MatchResult { flag: 2, origin: 1, channel }, "resonance {resonance}");
        assert_eq!(m.match_generated(&c.record, c.parent), rec);
    }
}

#[test]
fn bottom_ancestor_two_levels_up_is_non_prompt() {
    // Λb → X → Λc
    let c = direct_decay(&[5122, 4124], LAMBDA_C_PLUS, 1);
    let m = DecayMatcher::default();
    let rec = m.match_reconstructed(&c.record, links(c.prongs));
    assert_eq!(rec.flag, 2);
    assert_eq!(rec.origin_type(), OriginType::NonPrompt);
    assert_eq!(m.match_generated(&c.record, c.parent).origin, OriginType::NonPrompt as i8);
}

#[test]
fn non_bottom_ancestors_above_the_bottom_one_keep_non_prompt() {
    let m = DecayMatcher::default();
    let base = direct_decay(&[B_QUARK, 5122], LAMBDA_C_PLUS, 1);
    let padded = direct_decay(&[2212, 21, 21, B_QUARK, 5122, 4124], LAMBDA_C_PLUS, 1);
    for c in [base, padded] {
        let rec = m.match_reconstructed(&c.record, links(c.prongs));
        assert_eq!(rec.origin_type(), OriginType::NonPrompt);
    }
}

#[test]
fn charge_conjugate_flips_only_the_sign() {
    let m = DecayMatcher::default();
    for (ancestors, parent) in [(&[][..], LAMBDA_C_PLUS), (&[5122][..], XI_C_PLUS)] {
        let particle = direct_decay(ancestors, parent, 1);
        let anti = direct_decay(ancestors, parent, -1);
        let a = m.match_reconstructed(&particle.record, links(particle.prongs));
        let b = m.match_reconstructed(&anti.record, links(anti.prongs));
        assert!(a.is_matched());
        assert_eq!(b.flag, -a.flag);
        assert_eq!(b.channel, a.channel);
        assert_eq!(b.origin, a.origin);
    }

    let c = resonant_decay(PROTON, K_STAR_0, [-K_PLUS, PI_PLUS], -1);
    let rec = m.match_reconstructed(&c.record, links(c.prongs));
    assert_eq!(rec, MatchResult { flag: -2, origin: 1, channel: 1 });
}

#[test]
fn xi_c_gets_its_own_bit() {
    let c = direct_decay(&[], XI_C_PLUS, 1);
    let m = DecayMatcher::default();
    let rec = m.match_reconstructed(&c.record, links(c.prongs));
    assert_eq!(rec, MatchResult { flag: 8, origin: 1, channel: 0 });
}

#[test]
fn unexpected_species_do_not_match() {
    let mut b = McRecordBuilder::new();
    let lc = b.push(LAMBDA_C_PLUS, None);
    let p = b.push(PROTON, Some(lc));
    let k = b.push(K_PLUS, Some(lc));
    let pi = b.push(PI_PLUS, Some(lc));
    let r = b.build().unwrap();
    let m = DecayMatcher::default();
    assert_eq!(m.match_reconstructed(&r, [Some(p), Some(k), Some(pi)]), MatchResult::UNMATCHED);
    assert_eq!(m.match_generated(&r, lc), MatchResult::UNMATCHED);

    // right species, wrong parent: a bottom ancestor does not change the outcome
    let c = direct_decay(&[5122], D_PLUS, 1);
    assert_eq!(m.match_reconstructed(&c.record, links(c.prongs)), MatchResult::UNMATCHED);
}

#[test]
fn extra_daughters_break_the_match() {
    let mut b = McRecordBuilder::new();
    let lc = b.push(LAMBDA_C_PLUS, None);
    let p = b.push(PROTON, Some(lc));
    let k = b.push(-K_PLUS, Some(lc));
    let pi = b.push(PI_PLUS, Some(lc));
    b.push(111, Some(lc));
    let r = b.build().unwrap();
    let m = DecayMatcher::default();
    assert_eq!(m.match_reconstructed(&r, [Some(p), Some(k), Some(pi)]), MatchResult::UNMATCHED);
}

#[test]
fn prongs_from_another_decay_do_not_match() {
    let mut b = McRecordBuilder::new();
    let lc1 = b.push(LAMBDA_C_PLUS, None);
    let p = b.push(PROTON, Some(lc1));
    b.push(-K_PLUS, Some(lc1));
    b.push(PI_PLUS, Some(lc1));
    let lc2 = b.push(LAMBDA_C_PLUS, None);
    b.push(PROTON, Some(lc2));
    let k2 = b.push(-K_PLUS, Some(lc2));
    let pi2 = b.push(PI_PLUS, Some(lc2));
    let r = b.build().unwrap();
    let m = DecayMatcher::default();
    assert_eq!(m.match_reconstructed(&r, [Some(p), Some(k2), Some(pi2)]), MatchResult::UNMATCHED);
}

#[test]
fn cyclic_ancestry_degrades_to_unmatched() {
    let c = direct_decay(&[4124], LAMBDA_C_PLUS, 1);
    let mut particles = c.record.particles().to_vec();
    // the excited Λc claims its own daughter as mother
    particles[0].mother = Some(c.parent);
    let r = McRecord::from_particles(particles);
    let m = DecayMatcher::default();

    assert!(m.try_match_reconstructed(&r, links(c.prongs)).is_err());
    assert_eq!(m.match_reconstructed(&r, links(c.prongs)), MatchResult::UNMATCHED);
    assert_eq!(m.match_generated(&r, c.parent), MatchResult::UNMATCHED);
}

#[test]
fn ancestry_deeper_than_the_bound_degrades_to_unmatched() {
    let c = direct_decay(&vec![21; MAX_ANCESTRY_DEPTH + 1], LAMBDA_C_PLUS, 1);
    let m = DecayMatcher::default();

    assert!(matches!(
        m.try_match_reconstructed(&c.record, links(c.prongs)),
        Err(Error::Structural(_))
    ));
    assert_eq!(m.match_reconstructed(&c.record, links(c.prongs)), MatchResult::UNMATCHED);
    assert_eq!(m.match_generated(&c.record, c.parent), MatchResult::UNMATCHED);
}

#[test]
fn ancestry_at_the_bound_still_classifies() {
    let m = DecayMatcher::default();
    let prompt = direct_decay(&vec![21; MAX_ANCESTRY_DEPTH], LAMBDA_C_PLUS, 1);
    let rec = m.match_reconstructed(&prompt.record, links(prompt.prongs));
    assert_eq!(rec, MatchResult { flag: 2, origin: OriginType::Prompt as i8, channel: 0 });
    assert_eq!(m.match_generated(&prompt.record, prompt.parent), rec);

    // bottom hadron at the top of the longest allowed chain
    let mut ancestors = vec![21; MAX_ANCESTRY_DEPTH];
    ancestors[0] = 5122;
    let non_prompt = direct_decay(&ancestors, LAMBDA_C_PLUS, 1);
    let rec = m.match_reconstructed(&non_prompt.record, links(non_prompt.prongs));
    assert_eq!(rec.origin_type(), OriginType::NonPrompt);
}

#[test]
fn batch_matching_preserves_order() {
    let c = direct_decay(&[5122], LAMBDA_C_PLUS, 1);
    let m = DecayMatcher::default();
    let mut triplets: Vec<[Option<usize>; 3]> = Vec::new();
    for i in 0..300 {
        triplets.push(if i % 3 == 0 { links(c.prongs) } else { [Some(c.prongs[0]), None, None] });
    }
    let out = m.match_reconstructed_all(&c.record, &triplets);
    assert_eq!(out.len(), triplets.len());
    for (i, r) in out.iter().enumerate() {
        assert_eq!(r.is_matched(), i % 3 == 0, "triplet {i}");
    }

    let generated = m.match_generated_all(&c.record);
    assert_eq!(generated.len(), c.record.len());
    let matched: Vec<usize> =
        generated.iter().enumerate().filter(|(_, r)| r.is_matched()).map(|(i, _)| i).collect();
    assert_eq!(matched, vec![c.parent]);
}

#[test]
fn record_round_trips_through_json() {
    let c = direct_decay(&[5122], LAMBDA_C_PLUS, 1);
    let json = serde_json::to_string(&c.record).unwrap();
    let back: McRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, c.record);
    assert_eq!(
        back.get(c.parent),
        Some(&McParticle { pdg_code: LAMBDA_C_PLUS, mother: Some(0), daughters: Some((2, 4)) })
    );
}
