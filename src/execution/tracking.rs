//! Cross-pass document tracking for pipelines that process each document once.
//!
//! # Algorithm
//!
//! ```text
//! stage k output ──► group by source ──► per group:
//!                                        ├─ no source / recomputed this pass ─► keep
//!                                        ├─ fingerprint matches stage k ───────► drop, reuse outputs
//!                                        └─ new or changed ────────────────────► record, keep
//! ```
//!
//! A group's fingerprint combines the content fingerprints of every document
//! carrying that source at that stage, in stream order. Once a source is
//! recomputed, all of its descendants are recomputed in later stages too.
//!
//! The final output of a recomputed source is stored with its entry and
//! republished whenever the entry is reused, at the position the source held
//! in the stream. Entries not touched during a pass are evicted.
//!
//! # Barriers
//!
//! Dropping a group is only sound when everything downstream of it can be
//! attributed back to a source. A stage `k > 0` whose output holds an
//! unsourced document, or a new lineage under a source not seen before, is a
//! barrier: its output may depend on any of its inputs. The last barrier of a
//! pass is remembered, and the next pass drops nothing before it. When a pass
//! hits a barrier after it already dropped documents, it asks the pipeline to
//! rerun with reuse disabled.

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::document::{Document, DocumentId, Fingerprint};
use crate::error::Result;
use crate::io::NormalizedPath;

#[derive(Clone)]
struct Entry {
    /// Stage the source was recorded at and its group fingerprint there.
    stage: usize,
    fingerprint: Option<Fingerprint>,
    /// Final pipeline output of this source.
    outputs: Vec<Document>,
}

/// Tracking state kept between passes.
#[derive(Clone, Default)]
pub(crate) struct Tracker {
    entries: FxHashMap<NormalizedPath, Entry>,
    barrier: usize,
}

impl Tracker {
    /// Number of tracked sources.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Last barrier stage seen by the committed pass.
    pub(crate) fn barrier(&self) -> usize {
        self.barrier
    }

    /// Start a pass on a working copy; `self` stays untouched until the pass
    /// is committed. Without `reuse` every group is recomputed and recorded.
    pub(crate) fn begin(&self, pipeline: &str, reuse: bool) -> TrackedPass {
        TrackedPass {
            pipeline: pipeline.to_string(),
            state: self.clone(),
            reuse,
            barrier: 0,
            first_drop: None,
            seen: IndexSet::new(),
            recomputed: FxHashSet::default(),
            reused: IndexSet::new(),
        }
    }
}

/// Result of filtering one stage.
pub(crate) enum Filtered {
    /// Documents that flow to the next stage.
    Keep(Vec<Document>),
    /// Documents were dropped upstream of a barrier; rerun without reuse.
    Restart,
}

/// One pass over a tracked pipeline.
pub(crate) struct TrackedPass {
    pipeline: String,
    state: Tracker,
    reuse: bool,
    barrier: usize,
    first_drop: Option<usize>,
    /// Every source grouped this pass, in first-appearance order.
    seen: IndexSet<NormalizedPath>,
    recomputed: FxHashSet<NormalizedPath>,
    reused: IndexSet<NormalizedPath>,
}

impl TrackedPass {
    /// Remove unchanged source groups from the output of stage `stage`.
    ///
    /// `inputs` holds the lineage ids the stage's module received.
    pub(crate) fn filter(
        &mut self,
        stage: usize,
        inputs: &FxHashSet<DocumentId>,
        documents: Vec<Document>,
    ) -> Result<Filtered> {
        if stage > 0 && documents.iter().any(|doc| self.is_unattributed(doc, inputs)) {
            self.barrier = stage;
            if self.first_drop.is_some_and(|dropped| dropped < stage) {
                tracing::debug!(
                    pipeline = %self.pipeline,
                    stage,
                    "stage output cannot be attributed to sources, disabling reuse"
                );
                return Ok(Filtered::Restart);
            }
        }

        let mut groups: Vec<(NormalizedPath, Vec<usize>)> = Vec::new();
        let mut index: FxHashMap<&NormalizedPath, usize> = FxHashMap::default();
        for (i, doc) in documents.iter().enumerate() {
            if let Some(source) = doc.source()
                && !self.recomputed.contains(source)
            {
                let slot = *index.entry(source).or_insert_with(|| {
                    groups.push((source.clone(), Vec::new()));
                    groups.len() - 1
                });
                groups[slot].1.push(i);
            }
        }

        let droppable = self.reuse && stage >= self.state.barrier;
        let mut keep = vec![true; documents.len()];
        for (source, members) in groups {
            if self.reused.contains(&source) {
                tracing::debug!(
                    pipeline = %self.pipeline,
                    stage,
                    source = %source,
                    "reused source reappeared downstream, disabling reuse"
                );
                return Ok(Filtered::Restart);
            }
            self.seen.insert(source.clone());

            let fingerprint = self.group_fingerprint(&source, &members, &documents)?;
            let unchanged = droppable
                && fingerprint.is_some()
                && self
                    .state
                    .entries
                    .get(&source)
                    .is_some_and(|entry| entry.stage == stage && entry.fingerprint == fingerprint);

            if unchanged {
                tracing::debug!(
                    pipeline = %self.pipeline,
                    stage,
                    source = %source,
                    documents = members.len(),
                    "reusing unchanged documents"
                );
                for i in members {
                    keep[i] = false;
                }
                self.first_drop.get_or_insert(stage);
                self.reused.insert(source);
            } else {
                tracing::debug!(
                    pipeline = %self.pipeline,
                    stage,
                    source = %source,
                    documents = members.len(),
                    "recomputing changed documents"
                );
                self.state.entries.insert(
                    source.clone(),
                    Entry {
                        stage,
                        fingerprint,
                        outputs: Vec::new(),
                    },
                );
                self.recomputed.insert(source);
            }
        }

        Ok(Filtered::Keep(
            documents
                .into_iter()
                .zip(keep)
                .filter_map(|(doc, keep)| keep.then_some(doc))
                .collect(),
        ))
    }

    fn is_unattributed(&self, doc: &Document, inputs: &FxHashSet<DocumentId>) -> bool {
        match doc.source() {
            None => true,
            Some(source) => {
                !self.seen.contains(source) && !inputs.contains(&doc.id())
            }
        }
    }

    /// Combined fingerprint of a group, or `None` when some member cannot be
    /// read. Unreadable groups are always recomputed.
    fn group_fingerprint(
        &self,
        source: &NormalizedPath,
        members: &[usize],
        documents: &[Document],
    ) -> Result<Option<Fingerprint>> {
        let mut fingerprints = Vec::with_capacity(members.len());
        for &i in members {
            match documents[i].fingerprint() {
                Ok(fingerprint) => fingerprints.push(fingerprint),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        pipeline = %self.pipeline,
                        document = %source,
                        error = %e,
                        "cannot fingerprint document, recomputing it"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(Fingerprint::combine(&fingerprints)))
    }

    /// Record the pipeline output and evict untouched entries.
    ///
    /// Returns the committed state and the documents to publish. Outputs of
    /// reused sources are spliced into `computed` where their source first
    /// appeared, so the order does not depend on which sources changed.
    pub(crate) fn finish(mut self, computed: Vec<Document>) -> (Tracker, Vec<Document>) {
        for doc in &computed {
            if let Some(source) = doc.source()
                && self.recomputed.contains(source)
                && let Some(entry) = self.state.entries.get_mut(source)
            {
                entry.outputs.push(doc.clone());
            }
        }

        let rank = |source: &NormalizedPath| self.seen.get_index_of(source).unwrap_or(usize::MAX);
        let mut pending = self.reused.iter().peekable();
        let mut published = Vec::with_capacity(computed.len());
        for doc in computed {
            if let Some(source) = doc.source() {
                let position = rank(source);
                while let Some(reused) = pending.next_if(|reused| rank(reused) < position) {
                    published.extend(self.outputs_of(reused));
                }
            }
            published.push(doc);
        }
        for reused in pending {
            published.extend(self.outputs_of(reused));
        }

        let before = self.state.entries.len();
        let (recomputed, reused) = (&self.recomputed, &self.reused);
        self.state
            .entries
            .retain(|source, _| recomputed.contains(source) || reused.contains(source));
        let evicted = before - self.state.entries.len();
        if evicted > 0 {
            tracing::debug!(pipeline = %self.pipeline, evicted, "evicted stale tracked sources");
        }

        self.state.barrier = self.barrier;
        (self.state, published)
    }

    fn outputs_of(&self, source: &NormalizedPath) -> Vec<Document> {
        self.state
            .entries
            .get(source)
            .map(|entry| entry.outputs.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str, text: &str) -> Document {
        Document::builder().source(source).text(text).build().unwrap()
    }

    fn sources(docs: &[Document]) -> Vec<String> {
        docs.iter().map(Document::source_string).collect()
    }

    fn ids(docs: &[Document]) -> FxHashSet<DocumentId> {
        docs.iter().map(Document::id).collect()
    }

    fn keep(filtered: Filtered) -> Vec<Document> {
        match filtered {
            Filtered::Keep(docs) => docs,
            Filtered::Restart => panic!("unexpected restart"),
        }
    }

    fn stage0(pass: &mut TrackedPass, docs: Vec<Document>) -> Vec<Document> {
        keep(pass.filter(0, &FxHashSet::default(), docs).unwrap())
    }

    #[test]
    fn test_unchanged_groups_are_reused() {
        let tracker = Tracker::default();

        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/a", "1"), doc("/b", "2")]);
        assert_eq!(kept.len(), 2);
        let (tracker, published) = pass.finish(kept);
        assert_eq!(sources(&published), vec!["/a", "/b"]);
        assert_eq!(tracker.len(), 2);

        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/a", "1"), doc("/b", "changed")]);
        assert_eq!(sources(&kept), vec!["/b"]);
        let (tracker, published) = pass.finish(kept);
        assert_eq!(sources(&published), vec!["/a", "/b"]);
        assert_eq!(published[1].read_string().unwrap(), "changed");
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_published_order_is_stable() {
        let tracker = Tracker::default();
        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/a", "1"), doc("/b", "2"), doc("/c", "3")]);
        let (tracker, _) = pass.finish(kept);

        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/a", "x"), doc("/b", "2"), doc("/c", "3")]);
        assert_eq!(sources(&kept), vec!["/a"]);
        let (tracker, published) = pass.finish(kept);
        assert_eq!(sources(&published), vec!["/a", "/b", "/c"]);

        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/a", "x"), doc("/b", "y"), doc("/c", "3")]);
        assert_eq!(sources(&kept), vec!["/b"]);
        let (_, published) = pass.finish(kept);
        assert_eq!(sources(&published), vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_recomputed_sources_pass_later_stages() {
        let tracker = Tracker::default();
        let mut pass = tracker.begin("p", true);
        let first = stage0(&mut pass, vec![doc("/a", "1")]);
        let derived = vec![
            first[0].derive().text("x").build().unwrap(),
            first[0].derive().text("y").build().unwrap(),
        ];
        let kept = keep(pass.filter(1, &ids(&first), derived).unwrap());
        assert_eq!(kept.len(), 2);
        let (tracker, published) = pass.finish(kept);
        assert_eq!(published.len(), 2);
        assert_eq!(tracker.barrier(), 0);

        let mut pass = tracker.begin("p", true);
        assert!(stage0(&mut pass, vec![doc("/a", "1")]).is_empty());
        let (_, published) = pass.finish(Vec::new());
        assert_eq!(published.len(), 2);
    }

    #[test]
    fn test_unsourced_output_is_a_barrier() {
        let tracker = Tracker::default();
        let mut pass = tracker.begin("p", true);
        let first = stage0(&mut pass, vec![doc("/a", "1"), doc("/b", "2")]);
        let merged = vec![Document::builder().text("12").build().unwrap()];
        let kept = keep(pass.filter(1, &ids(&first), merged).unwrap());
        let (tracker, published) = pass.finish(kept);
        assert_eq!(published.len(), 1);
        assert_eq!(tracker.barrier(), 1);

        // Nothing is dropped ahead of the barrier on the next pass.
        let mut pass = tracker.begin("p", true);
        let first = stage0(&mut pass, vec![doc("/a", "1"), doc("/b", "2")]);
        assert_eq!(first.len(), 2);
        let merged = vec![Document::builder().text("12").build().unwrap()];
        let kept = keep(pass.filter(1, &ids(&first), merged).unwrap());
        let (tracker, published) = pass.finish(kept);
        assert_eq!(published.len(), 1);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_new_barrier_after_drop_restarts() {
        let tracker = Tracker::default();
        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/a", "1")]);
        let (tracker, _) = pass.finish(kept);

        let mut pass = tracker.begin("p", true);
        let first = stage0(&mut pass, vec![doc("/a", "1")]);
        assert!(first.is_empty());
        let orphan = vec![Document::builder().text("new").build().unwrap()];
        assert!(matches!(
            pass.filter(1, &ids(&first), orphan).unwrap(),
            Filtered::Restart
        ));

        let mut pass = tracker.begin("p", false);
        assert_eq!(stage0(&mut pass, vec![doc("/a", "1")]).len(), 1);
    }

    #[test]
    fn test_unseen_sources_are_evicted() {
        let tracker = Tracker::default();
        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/a", "1"), doc("/b", "2")]);
        let (tracker, _) = pass.finish(kept);

        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/a", "1")]);
        let (tracker, published) = pass.finish(kept);
        assert_eq!(sources(&published), vec!["/a"]);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_unreadable_group_is_recomputed() {
        use crate::testing::unreadable_document;

        let unreadable = || unreadable_document("/bad");
        let tracker = Tracker::default();
        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/good", "1"), unreadable()]);
        let (tracker, _) = pass.finish(kept);

        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![doc("/good", "1"), unreadable()]);
        assert_eq!(sources(&kept), vec!["/bad"]);
    }

    #[test]
    fn test_unsourced_documents_always_flow() {
        let tracker = Tracker::default();
        let unsourced = Document::builder().text("x").build().unwrap();
        let mut pass = tracker.begin("p", true);
        let kept = stage0(&mut pass, vec![unsourced.clone()]);
        let (tracker, published) = pass.finish(kept);
        assert_eq!(published.len(), 1);
        assert_eq!(tracker.len(), 0);
    }
}
