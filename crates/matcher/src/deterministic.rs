//! Layer 1: pure-CPU matching.
//!
//! For each chunk, in sequence order, the first strategy that succeeds wins:
//!
//! 1. exact substring                        -> `Exact`
//! 2. whitespace-normalized substring        -> `High`
//! 3. aggressively normalized substring      -> `High`
//! 4. three-fragment triangulation           -> `High`
//! 5. sliding-window edit distance           -> `Medium`
//!
//! Every strategy searches a bounded region that starts at the end of the
//! nearest preceding anchor. Each success becomes an anchor for the chunks
//! that follow, so regions stay tight as the pass moves through the text.
//! The substring strategies are linear scans and retry over the rest of the
//! target when the bounded region misses. Edit distance never leaves its
//! bounded region; with no anchor yet, that region is centred on the chunk's
//! proportional position instead of covering the whole target.

use async_trait::async_trait;
use canonical::{
    collapse_whitespace, edit_similarity_at_least, normalize_str, NormalizeConfig,
    NormalizedText, TargetText,
};
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

use crate::anchors::AnchorSet;
use crate::config::MatchConfig;
use crate::layer::{LayerContext, MatchLayer};
use crate::types::{ConfidenceTier, MatchMethod, MatchResult, SourceChunk};

#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicMatcher;

impl DeterministicMatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MatchLayer for DeterministicMatcher {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    async fn resolve(&self, ctx: &LayerContext<'_>, pending: &[&SourceChunk]) -> Vec<MatchResult> {
        let search = FoldedTarget::new(ctx.target);
        let mut anchors = ctx.anchors.clone();
        let mut results = Vec::new();

        for chunk in pending {
            if chunk.is_blank() {
                continue;
            }
            let start = Instant::now();
            let plan = SearchPlan::for_chunk(ctx, &anchors, chunk);
            if let Some(result) = locate(&search, ctx.config, chunk, plan) {
                debug!(
                    sequence_index = chunk.sequence_index,
                    method = result.method.as_str(),
                    start_offset = result.start_offset,
                    end_offset = result.end_offset,
                    elapsed_micros = start.elapsed().as_micros() as u64,
                    "deterministic_hit"
                );
                anchors.insert(&result);
                results.push(result);
            }
        }
        results
    }
}

/// Target text folded once per run at both normalization levels.
pub(crate) struct FoldedTarget<'a> {
    target: &'a TargetText,
    whitespace: NormalizedText,
    aggressive: NormalizedText,
}

impl<'a> FoldedTarget<'a> {
    pub(crate) fn new(target: &'a TargetText) -> Self {
        let len = target.len_chars();
        Self {
            target,
            whitespace: target.normalized(0, len, &NormalizeConfig::whitespace_only()),
            aggressive: target.normalized(0, len, &NormalizeConfig::aggressive()),
        }
    }
}

/// Char range `[start, end)` of the target a chunk may match in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    /// `size` chars around `center`, shifted to stay inside `[0, len)`.
    fn around(center: usize, size: usize, len: usize) -> Self {
        let size = size.min(len);
        let start = center.saturating_sub(size / 2).min(len - size);
        Self {
            start,
            end: start + size,
        }
    }

    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Regions one chunk is searched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SearchPlan {
    /// Sized from the distance to the nearest preceding anchor; the whole
    /// target when there is none.
    pub bounded: Region,
    /// From the search hint to the end of the target.
    pub wide: Region,
    /// Where edit-distance windows are scored.
    pub fuzzy: Region,
}

impl SearchPlan {
    fn for_chunk(ctx: &LayerContext<'_>, anchors: &AnchorSet, chunk: &SourceChunk) -> Self {
        let len = ctx.target.len_chars();
        let content_len = chunk.content_chars();
        let hint = anchors.search_hint(chunk.sequence_index);
        let start = hint.from.min(len);
        let wide = Region { start, end: len };
        match hint.gap {
            Some(gap) => {
                let bounded = Region {
                    start,
                    end: start
                        .saturating_add(ctx.config.search_region_len(content_len, gap))
                        .min(len),
                };
                Self {
                    bounded,
                    wide,
                    fuzzy: bounded,
                }
            }
            None => {
                let rank = ctx.rank(chunk.sequence_index);
                let size = ctx.config.search_region_len(content_len, rank + 1);
                let center = ctx.proportional_offset(chunk.sequence_index);
                Self {
                    bounded: wide,
                    wide,
                    fuzzy: Region::around(center, size, len),
                }
            }
        }
    }
}

fn locate(
    search: &FoldedTarget<'_>,
    config: &MatchConfig,
    chunk: &SourceChunk,
    plan: SearchPlan,
) -> Option<MatchResult> {
    let idx = chunk.sequence_index;
    let content = chunk.content.as_str();

    let substring = find_substring(search, chunk, plan.bounded).or_else(|| {
        (plan.wide != plan.bounded)
            .then(|| find_substring(search, chunk, plan.wide))
            .flatten()
    });
    if let Some((start, end, method)) = substring {
        let tier = if method == MatchMethod::ExactSubstring {
            ConfidenceTier::Exact
        } else {
            ConfidenceTier::High
        };
        return Some(MatchResult::located(idx, start, end, tier, method));
    }

    if let Some((start, end)) = triangulate(search, config, content, plan.bounded) {
        return Some(MatchResult::located(
            idx,
            start,
            end,
            ConfidenceTier::High,
            MatchMethod::MultiAnchor,
        ));
    }

    sliding_window(search.target, config, content, plan.fuzzy).map(|(start, end, score)| {
        MatchResult::located(
            idx,
            start,
            end,
            ConfidenceTier::Medium,
            MatchMethod::EditDistance,
        )
        .with_similarity(score)
    })
}

/// Exact, then whitespace-normalized, then aggressive substring search.
fn find_substring(
    search: &FoldedTarget<'_>,
    chunk: &SourceChunk,
    region: Region,
) -> Option<(usize, usize, MatchMethod)> {
    let content = chunk.content.as_str();
    if let Some(start) = search.target.find_in(content, region.start, region.end) {
        return Some((
            start,
            start + chunk.content_chars(),
            MatchMethod::ExactSubstring,
        ));
    }

    let needle = normalize_str(content, &NormalizeConfig::whitespace_only());
    if let Some((start, end)) = find_folded(&search.whitespace, &needle, region) {
        return Some((start, end, MatchMethod::NormalizedWhitespace));
    }

    let needle = normalize_str(content, &NormalizeConfig::aggressive());
    find_folded(&search.aggressive, &needle, region)
        .map(|(start, end)| (start, end, MatchMethod::NormalizedAggressive))
}

/// First occurrence of a folded `needle` whose original span lies inside
/// `region`.
fn find_folded(folded: &NormalizedText, needle: &str, region: Region) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let needle_chars = needle.chars().count();
    let from = folded.folded_index_at(region.start);
    let hit = folded.find(needle, from)?;
    let (start, end) = folded.source_span(hit, hit + needle_chars)?;
    (end <= region.end).then_some((start, end))
}

#[derive(Debug, Clone, Copy)]
struct Fragment {
    /// Char offset of the fragment inside the chunk.
    expected: usize,
    /// Where it was found in the target.
    found: (usize, usize),
}

/// Locate first/middle/last fragments and derive the chunk span from the
/// ones that agree with each other.
fn triangulate(
    search: &FoldedTarget<'_>,
    config: &MatchConfig,
    content: &str,
    region: Region,
) -> Option<(usize, usize)> {
    let chars: Vec<char> = content.chars().collect();
    let total = chars.len();
    let frag = config.fragment_chars;
    if total < frag * 2 {
        return None;
    }

    let mid_start = total / 2 - frag / 2;
    let offsets = [0, mid_start, total - frag];
    let ws = NormalizeConfig::whitespace_only();

    let slots: Vec<Option<Fragment>> = offsets
        .iter()
        .map(|&expected| {
            let text: String = chars[expected..expected + frag].iter().collect();
            let needle = normalize_str(&text, &ws);
            find_folded(&search.whitespace, &needle, region).map(|found| Fragment {
                expected,
                found,
            })
        })
        .collect();

    let best = consistent_subset(&slots, config)?;
    let first = best.first()?;
    let last = best.last()?;

    let start = first.found.0.saturating_sub(first.expected);
    let end = (last.found.0 + (total - last.expected)).max(last.found.1);
    let end = end.min(search.target.len_chars());
    (start < end).then_some((start, end))
}

/// Largest set of found fragments, in chunk order, whose target order and
/// spacing match their positions in the chunk.
fn consistent_subset(slots: &[Option<Fragment>], config: &MatchConfig) -> Option<Vec<Fragment>> {
    let found: Vec<Fragment> = slots.iter().flatten().copied().collect();
    if found.len() < config.triangulation_min_fragments {
        return None;
    }

    let consistent = |set: &[Fragment]| {
        set.windows(2).all(|pair| {
            let (a, b) = (pair[0], pair[1]);
            if b.found.0 <= a.found.0 {
                return false;
            }
            let expected = (b.expected - a.expected) as f64;
            let actual = (b.found.0 - a.found.0) as f64;
            expected > 0.0
                && (actual - expected).abs() / expected <= config.triangulation_spacing_tolerance
        })
    };

    if consistent(&found) {
        return Some(found);
    }
    if found.len() == 3 && config.triangulation_min_fragments <= 2 {
        // Drop one fragment at a time; prefer keeping the outer two.
        for skip in [1, 2, 0] {
            let subset: Vec<Fragment> = found
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != skip)
                .map(|(_, f)| *f)
                .collect();
            if consistent(&subset) {
                return Some(subset);
            }
        }
    }
    None
}

/// Best window of the chunk's length by edit similarity, if it clears the
/// threshold. Returns `(start, end, score)`.
fn sliding_window(
    target: &TargetText,
    config: &MatchConfig,
    content: &str,
    region: Region,
) -> Option<(usize, usize, f64)> {
    let width = content.chars().count();
    if width == 0 || width > config.edit_max_chars || region.len() == 0 {
        return None;
    }
    let needle = collapse_whitespace(content);
    let width = width.min(region.len());
    let last_pos = region.end - width;

    let mut step = (width / 20).clamp(5, 10);
    let span = last_pos - region.start;
    if span / step + 1 > config.edit_max_windows {
        step = span.div_ceil(config.edit_max_windows.saturating_sub(1).max(1));
    }

    let threshold = config.edit_threshold_for(width);
    let score_at = |pos: usize| {
        let window = collapse_whitespace(target.slice(pos, pos + width));
        (pos, edit_similarity_at_least(&needle, &window, threshold))
    };

    let coarse: Vec<usize> = (region.start..=last_pos).step_by(step).collect();
    let mut best = best_of(coarse.par_iter().map(|&p| score_at(p)).collect())?;

    // Refine around the best coarse window, halving the step each round.
    while step > 1 {
        step = step.div_ceil(2);
        let (pos, _) = best;
        let neighbours = [pos.checked_sub(step), pos.checked_add(step)];
        for candidate in neighbours.into_iter().flatten() {
            if candidate < region.start || candidate > last_pos {
                continue;
            }
            let scored = score_at(candidate);
            if scored.1 > best.1 || (scored.1 == best.1 && scored.0 < best.0) {
                best = scored;
            }
        }
    }
    let (pos, score) = best;

    let short = width < config.short_content_chars;
    let accepted = score > threshold || (short && score >= threshold);
    if !accepted {
        return None;
    }

    let (start, end) = trim_span(target, pos, pos + width);
    (start < end).then_some((start, end, score))
}

/// Highest score; ties go to the earliest position so results are stable.
fn best_of(scored: Vec<(usize, f64)>) -> Option<(usize, f64)> {
    scored.into_iter().fold(None, |best, (pos, score)| match best {
        Some((_, best_score)) if best_score >= score => best,
        _ => Some((pos, score)),
    })
}

/// Shrink a span so it neither starts nor ends on whitespace.
fn trim_span(target: &TargetText, mut start: usize, mut end: usize) -> (usize, usize) {
    let text = target.slice(start, end);
    for c in text.chars() {
        if !c.is_whitespace() || start >= end {
            break;
        }
        start += 1;
    }
    for c in text.chars().rev() {
        if !c.is_whitespace() || end <= start {
            break;
        }
        end -= 1;
    }
    (start, end)
}
