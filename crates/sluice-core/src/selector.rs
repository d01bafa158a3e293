//! Fee-maximizing batch selector.
//!
//! Finds the subset of a batch that is collectively valid against the pool
//! and has the largest total fee, then commits exactly that subset.
//!
//! Candidates in a batch can conflict (two transactions spend the same UTXO)
//! or chain (one spends an output another creates), so the choice is a
//! maximum-weight selection over a conflict/dependency graph. The selector
//! solves it with an include/exclude branch-and-bound search:
//!
//! 1. **Screening.** Each finalized candidate is validated once against the
//!    pool overlaid with every output the batch creates. Signatures, output
//!    signs and balance do not depend on which other candidates are taken,
//!    so a candidate failing here can never be valid and is dropped.
//!    Repeated copies of one transaction are screened once.
//! 2. **Ordering.** Survivors are ordered so every producer comes before its
//!    consumers (highest fee first among ready candidates).
//! 3. **Splitting.** Candidates that share an input, or where one spends the
//!    other's output, are linked. Each connected group is searched on its
//!    own; groups cannot affect each other's validity.
//! 4. **Search.** Within a group every candidate is tried both included
//!    (only if all its inputs are still live on the branch, on a copy of the
//!    branch's live outpoints) and excluded. A branch is cut when its fee
//!    plus an optimistic bound on the rest cannot beat the best subset
//!    found. The bound counts each contested outpoint once, at the fee of
//!    its best reachable claimant.
//!
//! Equal-fee subsets are ranked by size, larger first, so zero-fee
//! transactions are kept when nothing conflicts with them. Exploration never
//! touches the caller's pool; only the winning subset is applied.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::SelectorConfig;
use crate::crypto::Ed25519Verifier;
use crate::traits::{SignatureVerifier, UtxoView};
use crate::types::{Hash256, OutPoint, Transaction, TxOutput};
use crate::utxo_pool::UtxoPool;
use crate::validation::Validator;

/// Result of a max-fee selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selected transactions in a valid acceptance order.
    pub accepted: Vec<Transaction>,
    /// Sum of the selected transactions' fees in base units.
    pub total_fee: i64,
    /// Number of search nodes expanded.
    pub nodes_visited: u64,
    /// Whether the search budget ran out before the search completed.
    /// When set, the selection is valid but may not be optimal.
    pub exhausted: bool,
}

/// A batch transaction that survived screening.
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    /// Position in the caller's batch.
    index: usize,
    tx: &'a Transaction,
    fee: i64,
}

/// The pool overlaid with every output the batch would create.
struct BatchView<'p, 'b> {
    pool: &'p UtxoPool,
    produced: HashMap<OutPoint, &'b TxOutput>,
}

impl UtxoView for BatchView<'_, '_> {
    fn get_utxo(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.pool
            .get(outpoint)
            .or_else(|| self.produced.get(outpoint).copied())
    }
}

/// Branch-and-bound max-fee selector.
#[derive(Debug, Clone, Default)]
pub struct MaxFeeSelector<V = Ed25519Verifier> {
    validator: Validator<V>,
    config: SelectorConfig,
}

impl MaxFeeSelector<Ed25519Verifier> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SelectorConfig) -> Self {
        Self {
            validator: Validator::new(),
            config,
        }
    }
}

impl<V: SignatureVerifier> MaxFeeSelector<V> {
    pub fn with_validator(validator: Validator<V>, config: SelectorConfig) -> Self {
        Self { validator, config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Choose the max-fee valid subset of `batch` without touching `pool`.
    pub fn select(&self, pool: &UtxoPool, batch: &[Transaction]) -> Selection {
        let ordered = dependency_order(self.screen(pool, batch));
        let groups = independent_groups(&ordered);

        let mut accepted = Vec::new();
        let mut total_fee: i64 = 0;
        let mut nodes: u64 = 0;
        let mut exhausted = false;

        for group in &groups {
            let mut search = Search::new(&self.config, group, pool, nodes);
            let (picked, fee) = if exhausted {
                search.dive()
            } else {
                search.run();
                nodes = search.nodes;
                if search.exhausted {
                    exhausted = true;
                    let found = (std::mem::take(&mut search.best), search.best_fee);
                    let dived = search.dive();
                    if (dived.1, dived.0.len()) > (found.1, found.0.len()) {
                        dived
                    } else {
                        found
                    }
                } else {
                    (std::mem::take(&mut search.best), search.best_fee)
                }
            };
            total_fee = total_fee.saturating_add(fee);
            accepted.extend(picked.iter().map(|&k| group[k].tx.clone()));
        }

        if exhausted {
            warn!(
                nodes,
                best_fee = total_fee,
                "max-fee: search budget exhausted, committing best subset found"
            );
        }
        debug!(
            candidates = ordered.len(),
            groups = groups.len(),
            nodes,
            "max-fee: search finished"
        );

        Selection {
            accepted,
            total_fee,
            nodes_visited: nodes,
            exhausted,
        }
    }

    /// Select the max-fee valid subset of `batch` and apply it to `pool`.
    pub fn commit(&self, pool: &mut UtxoPool, batch: &[Transaction]) -> Selection {
        let selection = self.select(pool, batch);

        for tx in &selection.accepted {
            match pool.apply_transaction(tx) {
                Ok(_) => {
                    if let Some(txid) = tx.hash() {
                        debug!(%txid, "max-fee: committed");
                    }
                }
                Err(e) => warn!(error = %e, "max-fee: selected transaction failed to apply"),
            }
        }

        info!(
            candidates = batch.len(),
            accepted = selection.accepted.len(),
            total_fee = selection.total_fee,
            nodes = selection.nodes_visited,
            exhausted = selection.exhausted,
            "max-fee: batch committed"
        );
        selection
    }

    /// Validate each distinct finalized candidate once, keeping those that
    /// can be valid in some acceptance order.
    fn screen<'a>(&self, pool: &UtxoPool, batch: &'a [Transaction]) -> Vec<Candidate<'a>> {
        let view = BatchView {
            pool,
            produced: batch.iter().flat_map(|tx| tx.created_utxos()).collect(),
        };
        let mut seen: HashSet<Hash256> = HashSet::with_capacity(batch.len());

        batch
            .iter()
            .enumerate()
            .filter_map(|(index, tx)| {
                let txid = tx.hash()?;
                if !seen.insert(txid) {
                    debug!(index, %txid, "max-fee: repeated candidate");
                    return None;
                }
                match self.validator.validate(&view, tx) {
                    Ok(validated) => Some(Candidate {
                        index,
                        tx,
                        fee: validated.fee,
                    }),
                    Err(e) => {
                        debug!(index, error = %e, "max-fee: candidate can never be valid");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Commit the max-fee valid subset of `batch` to `pool` with Ed25519
/// signatures and the default search budget.
///
/// Returns the committed transactions in acceptance order.
pub fn commit_max_fee(pool: &mut UtxoPool, batch: &[Transaction]) -> Vec<Transaction> {
    MaxFeeSelector::new().commit(pool, batch).accepted
}

/// Order candidates so producers precede consumers.
///
/// Among candidates whose producers are all placed, the highest fee goes
/// first (batch position breaks ties). Candidates caught in a dependency
/// cycle cannot be valid; they are appended in batch order.
fn dependency_order(candidates: Vec<Candidate<'_>>) -> Vec<Candidate<'_>> {
    let n = candidates.len();
    let mut by_hash: HashMap<Hash256, Vec<usize>> = HashMap::new();
    for (c, cand) in candidates.iter().enumerate() {
        if let Some(h) = cand.tx.hash() {
            by_hash.entry(h).or_default().push(c);
        }
    }

    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (c, cand) in candidates.iter().enumerate() {
        let parents: BTreeSet<usize> = cand
            .tx
            .inputs()
            .iter()
            .filter_map(|input| by_hash.get(&input.previous_output.txid))
            .flatten()
            .copied()
            .filter(|&p| p != c)
            .collect();
        indegree[c] = parents.len();
        for p in parents {
            dependents[p].push(c);
        }
    }

    let mut ready: BinaryHeap<(i64, Reverse<usize>)> = (0..n)
        .filter(|&c| indegree[c] == 0)
        .map(|c| (candidates[c].fee, Reverse(c)))
        .collect();

    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while let Some((_, Reverse(c))) = ready.pop() {
        placed[c] = true;
        order.push(candidates[c]);
        for &d in &dependents[c] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.push((candidates[d].fee, Reverse(d)));
            }
        }
    }

    if order.len() < n {
        debug!(stuck = n - order.len(), "max-fee: dependency cycle in batch");
        order.extend((0..n).filter(|&c| !placed[c]).map(|c| candidates[c]));
    }
    order
}

/// Split ordered candidates into groups that share no input and no
/// producer/consumer link. Each group keeps the dependency order; groups
/// are listed by their first member.
fn independent_groups<'a>(ordered: &[Candidate<'a>]) -> Vec<Vec<Candidate<'a>>> {
    let n = ordered.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut claimant: HashMap<OutPoint, usize> = HashMap::new();
    let mut producer: HashMap<Hash256, usize> = HashMap::new();
    for (c, cand) in ordered.iter().enumerate() {
        if let Some(h) = cand.tx.hash() {
            producer.insert(h, c);
        }
    }
    for (c, cand) in ordered.iter().enumerate() {
        for input in cand.tx.inputs() {
            let op = input.previous_output;
            let linked = [claimant.get(&op).copied(), producer.get(&op.txid).copied()];
            for other in linked.into_iter().flatten() {
                let (a, b) = (find(&mut parent, c), find(&mut parent, other));
                if a != b {
                    parent[a] = b;
                }
            }
            claimant.entry(op).or_insert(c);
        }
    }

    let mut slot: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<Candidate<'a>>> = Vec::new();
    for (c, cand) in ordered.iter().enumerate() {
        let root = find(&mut parent, c);
        let g = *slot.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[g].push(*cand);
    }
    groups
}

/// Branch-and-bound state for one independent group.
///
/// A branch is the set of live outpoints the group's candidates spend:
/// pool UTXOs not yet consumed plus outputs of included producers.
struct Search<'s, 'a> {
    config: &'s SelectorConfig,
    candidates: &'s [Candidate<'a>],
    /// Every outpoint some candidate of the group spends.
    wanted: HashSet<OutPoint>,
    /// Position of the candidate creating each outpoint, if any.
    producer: HashMap<OutPoint, usize>,
    root: HashSet<OutPoint>,
    /// Positions in `candidates` included on the current branch.
    chosen: Vec<usize>,
    best_fee: i64,
    best: Vec<usize>,
    nodes: u64,
    exhausted: bool,
}

impl<'s, 'a> Search<'s, 'a> {
    fn new(
        config: &'s SelectorConfig,
        candidates: &'s [Candidate<'a>],
        pool: &UtxoPool,
        nodes: u64,
    ) -> Self {
        let wanted: HashSet<OutPoint> = candidates
            .iter()
            .flat_map(|c| c.tx.inputs().iter().map(|i| i.previous_output))
            .collect();
        let producer = candidates
            .iter()
            .enumerate()
            .flat_map(|(k, c)| c.tx.created_utxos().map(move |(op, _)| (op, k)))
            .filter(|(op, _)| wanted.contains(op))
            .collect();
        let root = wanted.iter().filter(|op| pool.contains(op)).copied().collect();
        Self {
            config,
            candidates,
            wanted,
            producer,
            root,
            chosen: Vec::with_capacity(candidates.len()),
            best_fee: 0,
            best: Vec::new(),
            nodes,
            exhausted: false,
        }
    }

    fn run(&mut self) {
        let root = self.root.clone();
        self.explore(0, &root, 0);
    }

    fn spendable(&self, k: usize, live: &HashSet<OutPoint>) -> bool {
        self.candidates[k]
            .tx
            .inputs()
            .iter()
            .all(|input| live.contains(&input.previous_output))
    }

    /// Copy of `live` after including candidate `k`.
    fn spend(&self, k: usize, live: &HashSet<OutPoint>) -> HashSet<OutPoint> {
        let tx = self.candidates[k].tx;
        let mut next = live.clone();
        for input in tx.inputs() {
            next.remove(&input.previous_output);
        }
        next.extend(
            tx.created_utxos()
                .map(|(op, _)| op)
                .filter(|op| self.wanted.contains(op)),
        );
        next
    }

    /// Optimistic (fee, count) still obtainable from `candidates[k..]`.
    ///
    /// Two candidates taken together never share an input, so keying each
    /// reachable candidate by its first input and keeping the best fee per
    /// key bounds any valid choice.
    fn bound(&self, k: usize, live: &HashSet<OutPoint>) -> (i64, usize) {
        let mut per_input: HashMap<OutPoint, i64> = HashMap::new();
        let mut free_fee: i64 = 0;
        let mut free_count = 0;

        for cand in &self.candidates[k..] {
            let reachable = cand.tx.inputs().iter().all(|input| {
                let op = &input.previous_output;
                live.contains(op) || self.producer.get(op).is_some_and(|&p| p >= k)
            });
            if !reachable {
                continue;
            }
            match cand.tx.inputs().first() {
                Some(first) => {
                    let slot = per_input.entry(first.previous_output).or_insert(0);
                    *slot = (*slot).max(cand.fee);
                }
                None => {
                    free_fee = free_fee.saturating_add(cand.fee);
                    free_count += 1;
                }
            }
        }

        let fee = per_input
            .values()
            .fold(free_fee, |acc, f| acc.saturating_add(*f));
        (fee, per_input.len() + free_count)
    }

    fn explore(&mut self, k: usize, live: &HashSet<OutPoint>, fee: i64) {
        if self.exhausted {
            return;
        }

        if (fee, self.chosen.len()) > (self.best_fee, self.best.len()) {
            self.best_fee = fee;
            self.best.clone_from(&self.chosen);
        }

        if k == self.candidates.len() {
            return;
        }

        let (rest_fee, rest_count) = self.bound(k, live);
        let optimistic = (fee.saturating_add(rest_fee), self.chosen.len() + rest_count);
        if optimistic <= (self.best_fee, self.best.len()) {
            return;
        }

        self.nodes += 1;
        if self.config.budget_exceeded(self.nodes) {
            self.exhausted = true;
            return;
        }

        if self.spendable(k, live) {
            let next = self.spend(k, live);
            self.chosen.push(k);
            self.explore(k + 1, &next, fee.saturating_add(self.candidates[k].fee));
            self.chosen.pop();
        }

        self.explore(k + 1, live, fee);
    }

    /// Include every candidate that is spendable in order. Used once the
    /// budget is gone.
    fn dive(&self) -> (Vec<usize>, i64) {
        let mut live = self.root.clone();
        let mut picked = Vec::new();
        let mut fee: i64 = 0;
        for k in 0..self.candidates.len() {
            if self.spendable(k, &live) {
                live = self.spend(k, &live);
                picked.push(k);
                fee = fee.saturating_add(self.candidates[k].fee);
            }
        }
        (picked, fee)
    }
}
