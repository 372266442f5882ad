//! ALL(*) prediction
//!
//!     `adaptive_predict` answers one question: at decision `d`, given the upcoming tokens
//!     and the current call stack, which alternative should the parser take?
//!
//!     Prediction runs in two stages:
//!
//!         1. SLL. The simulation starts from the decision state with an unknown caller
//!            (`$` acts as a wildcard) and advances one token at a time, caching every
//!            configuration set it reaches as a DFA state. It stops on a set with a single
//!            alternative, or on a conflict it cannot settle.
//!         2. Full LL. On an SLL conflict (unless the mode is `Sll`), the simulation restarts
//!            with the real call stack of the parser. Nothing of this stage is cached, since
//!            it depends on the stack.
//!
//!     Predicates met during SLL are collected into the semantic context of the
//!     configurations. Accept states whose alternatives are guarded by predicates keep the
//!     predicates and evaluate them at prediction time, with the input rewound to the
//!     decision.
//!
//!     The token stream is always left where prediction found it.

use crate::atn::{Atn, Transition};
use crate::config_set::{AltSet, AtnConfig, AtnConfigSet, INVALID_ALT_NUMBER};
use crate::dfa::{Dfa, DfaCache, DfaState, DfaTarget, PredPrediction};
use crate::error::{Failure, RecognitionError, RecognitionErrorKind};
use crate::error_listener::{AmbiguityReport, ContextSensitivityReport, ErrorListeners, FullContextReport};
use crate::prediction_context::{ContextId, MergeCache, PredictionContextCache, EMPTY_RETURN_STATE};
use crate::semantic_context::{PredicateEvaluator, SemanticContext};
use crate::simulator::mode::{self, PredictionMode};
use crate::stream::TokenStream;
use crate::token::{Token, EOF};
use crate::tree::NodeId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What prediction needs from the parser driving it.
pub trait PredictionHost: PredicateEvaluator {
    fn input(&mut self) -> &mut dyn TokenStream;

    /// Precedence of the innermost left-recursive invocation.
    fn precedence(&self) -> i32;

    /// ATN state the parser is in, for error reports.
    fn current_state(&self) -> usize;

    /// Invoking states of `ctx` and its ancestors, innermost first.
    fn invoking_states(&self, ctx: Option<NodeId>) -> Vec<usize>;

    fn rule_name(&self, rule_index: usize) -> String;

    fn listeners(&mut self) -> &mut ErrorListeners;
}

/// Per-decision prediction statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionInfo {
    pub decision: usize,
    pub invocations: u64,
    /// Tokens looked at by SLL, summed over invocations.
    pub sll_lookahead: u64,
    pub ll_lookahead: u64,
    pub ll_fallbacks: u64,
    pub ambiguities: u64,
    pub context_sensitivities: u64,
    pub errors: u64,
}

pub struct ParserAtnSimulator {
    atn: Arc<Atn>,
    cache: Arc<DfaCache>,
    pub mode: PredictionMode,
    stats: Vec<DecisionInfo>,
}

/// State of one `adaptive_predict` call.
struct Prediction<'h> {
    host: &'h mut dyn PredictionHost,
    dfa: Arc<Dfa>,
    start_index: usize,
    outer: Option<NodeId>,
    merges: MergeCache,
}

impl Prediction<'_> {
    fn la1(&mut self) -> i32 {
        self.host.input().la(1)
    }

    fn seek(&mut self, index: usize) {
        self.host.input().seek(index);
    }

    fn index(&mut self) -> usize {
        self.host.input().index()
    }

    fn eval(&mut self, pred: &SemanticContext) -> bool {
        let outer = self.outer;
        pred.eval(self, outer)
    }
}

impl PredicateEvaluator for Prediction<'_> {
    fn sempred(&mut self, ctx: Option<NodeId>, rule_index: usize, pred_index: usize) -> bool {
        self.host.sempred(ctx, rule_index, pred_index)
    }

    fn precpred(&mut self, ctx: Option<NodeId>, precedence: i32) -> bool {
        self.host.precpred(ctx, precedence)
    }
}

type ClosureBusy = HashSet<AtnConfig>;

impl ParserAtnSimulator {
    pub fn new(atn: Arc<Atn>, cache: Arc<DfaCache>, mode: PredictionMode) -> Self {
        let stats = (0..atn.num_decisions())
            .map(|decision| DecisionInfo {
                decision,
                ..Default::default()
            })
            .collect();
        ParserAtnSimulator { atn, cache, mode, stats }
    }

    pub fn atn(&self) -> &Atn {
        &self.atn
    }

    pub fn decision_info(&self) -> &[DecisionInfo] {
        &self.stats
    }

    fn contexts(&self) -> &PredictionContextCache {
        self.cache.contexts()
    }

    /// Predicts the alternative to take at `decision`. Alternatives are numbered from 1.
    ///
    /// Returns a [RecognitionError] (no viable alternative) when the input matches none,
    /// and leaves the input at the decision in every case.
    pub fn adaptive_predict(
        &mut self,
        host: &mut dyn PredictionHost,
        decision: usize,
        outer: Option<NodeId>,
    ) -> Result<usize, Failure> {
        let dfa = self
            .cache
            .dfa(decision)
            .cloned()
            .ok_or(crate::error::AtnError::InvalidDecision(decision))?;
        let marker = host.input().mark();
        let start_index = host.input().index();
        let mut run = Prediction {
            host,
            dfa,
            start_index,
            outer,
            merges: MergeCache::new(),
        };
        if let Some(info) = self.stats.get_mut(decision) {
            info.invocations += 1;
        }

        let result = self.predict(&mut run);

        run.host.input().seek(start_index);
        run.host.input().release(marker);
        if result.is_err() {
            if let Some(info) = self.stats.get_mut(decision) {
                info.errors += 1;
            }
        }
        log::trace!("adaptive_predict decision {} at {} -> {:?}", decision, start_index, result.as_ref().ok());
        result
    }

    fn predict(&mut self, run: &mut Prediction<'_>) -> Result<usize, Failure> {
        let dfa = Arc::clone(&run.dfa);
        let precedence = run.host.precedence();
        let existing = if dfa.is_precedence_dfa() {
            dfa.precedence_start_state(precedence)
        } else {
            dfa.start_state()
        };
        let s0 = match existing {
            Some(s0) => s0,
            None => {
                let closure = self.compute_start_state(run, dfa.atn_start_state, ContextId::EMPTY, false);
                if dfa.is_precedence_dfa() {
                    let filtered = self.apply_precedence_filter(run, &closure);
                    let s0 = dfa.add_state(DfaState::new(filtered));
                    dfa.set_precedence_start_state(precedence, &s0);
                    s0
                } else {
                    let s0 = dfa.add_state(DfaState::new(closure));
                    dfa.set_start_state(&s0);
                    s0
                }
            }
        };
        self.exec_atn(run, s0)
    }

    fn exec_atn(&mut self, run: &mut Prediction<'_>, s0: Arc<DfaState>) -> Result<usize, Failure> {
        let decision = run.dfa.decision;
        let mut previous = s0;
        let mut t = run.la1();
        loop {
            if let Some(info) = self.stats.get_mut(decision) {
                info.sll_lookahead += 1;
            }
            let target = match run.dfa.edge(&previous, t) {
                Some(target) => target,
                None => self.compute_target_state(run, &previous, t),
            };
            let d = match target {
                DfaTarget::Error => {
                    let error = self.no_viable_alt(run, &previous.configs);
                    run.seek(run.start_index);
                    let alt = self.syn_valid_or_sem_invalid_alt(run, &previous.configs);
                    if alt != INVALID_ALT_NUMBER {
                        return Ok(alt);
                    }
                    return Err(error.into());
                }
                DfaTarget::State(d) => d,
            };

            if d.requires_full_context && self.mode != PredictionMode::Sll {
                let mut conflicting = d.configs.conflicting_alts.clone();
                if let Some(predicates) = &d.predicates {
                    let conflict_index = run.index();
                    if conflict_index != run.start_index {
                        run.seek(run.start_index);
                    }
                    let alts = Self::eval_predicates(run, predicates, true);
                    if alts.len() == 1 {
                        if let Some(&alt) = alts.iter().next() {
                            return Ok(alt);
                        }
                    }
                    conflicting = Some(alts);
                    if conflict_index != run.start_index {
                        run.seek(conflict_index);
                    }
                }
                if let Some(info) = self.stats.get_mut(decision) {
                    info.ll_fallbacks += 1;
                }
                let outer_context = self.outer_context(run);
                let decision_state = run.dfa.atn_start_state;
                let s0_closure = self.compute_start_state(run, decision_state, outer_context, true);
                let stop_index = run.index();
                self.report_attempting_full_context(run, conflicting, &d.configs, stop_index);
                return self.exec_atn_with_full_context(run, s0_closure);
            }

            if d.is_accept {
                let Some(predicates) = &d.predicates else {
                    return Ok(d.prediction);
                };
                let stop_index = run.index();
                run.seek(run.start_index);
                let alts = Self::eval_predicates(run, predicates, true);
                return match alts.iter().next().copied() {
                    None => Err(self.no_viable_alt(run, &d.configs).into()),
                    Some(alt) => {
                        if alts.len() > 1 {
                            self.report_ambiguity(run, stop_index, false, alts, &d.configs);
                        }
                        Ok(alt)
                    }
                };
            }

            previous = d;
            if t != EOF {
                run.host.input().consume();
                t = run.la1();
            }
        }
    }

    fn outer_context(&self, run: &Prediction<'_>) -> ContextId {
        let invoking = run.host.invoking_states(run.outer);
        self.contexts().from_invoking_states(&self.atn, invoking)
    }

    fn compute_target_state(&self, run: &mut Prediction<'_>, previous: &DfaState, t: i32) -> DfaTarget {
        let dfa = Arc::clone(&run.dfa);
        let Some(reach) = self.compute_reach_set(run, &previous.configs, t, false) else {
            dfa.add_edge(previous, t, &DfaTarget::Error);
            return DfaTarget::Error;
        };

        let mut reach = reach;
        let mut state_is_accept = false;
        let mut requires_full_context = false;
        let mut prediction = INVALID_ALT_NUMBER;
        let predicted = reach.unique_alt();
        if predicted != INVALID_ALT_NUMBER {
            state_is_accept = true;
            reach.unique_alt = predicted;
            prediction = predicted;
        } else if self
            .mode
            .has_sll_conflict_terminating_prediction(&self.atn, &reach, self.contexts())
        {
            let conflicting = mode::conflicting_alts(&reach);
            prediction = conflicting.iter().next().copied().unwrap_or(INVALID_ALT_NUMBER);
            reach.conflicting_alts = Some(conflicting);
            requires_full_context = true;
            state_is_accept = true;
        }

        let mut d = DfaState::new(reach);
        d.is_accept = state_is_accept;
        d.requires_full_context = requires_full_context;
        d.prediction = prediction;
        if d.is_accept && d.configs.has_semantic_context {
            self.predicate_dfa_state(&mut d, dfa.atn_start_state);
        }

        let d = dfa.add_state(d);
        let target = DfaTarget::State(d);
        dfa.add_edge(previous, t, &target);
        target
    }

    fn predicate_dfa_state(&self, d: &mut DfaState, decision_state: usize) {
        let alt_count = self.atn.state(decision_state).transitions().len();
        let alts: AltSet = if d.configs.unique_alt != INVALID_ALT_NUMBER {
            [d.configs.unique_alt].into_iter().collect()
        } else {
            d.configs.conflicting_alts.clone().unwrap_or_default()
        };
        match Self::preds_for_ambig_alts(&alts, &d.configs, alt_count) {
            Some(alt_to_pred) => {
                d.predicates = Self::predicate_predictions(&alts, &alt_to_pred);
                d.prediction = INVALID_ALT_NUMBER;
            }
            None => {
                d.prediction = alts.iter().next().copied().unwrap_or(INVALID_ALT_NUMBER);
            }
        }
    }

    /// The predicate guarding each alternative of `ambig_alts` (index = alternative),
    /// or `None` if no alternative has one.
    fn preds_for_ambig_alts(ambig_alts: &AltSet, configs: &AtnConfigSet, alt_count: usize) -> Option<Vec<SemanticContext>> {
        let mut alt_to_pred: Vec<Option<SemanticContext>> = vec![None; alt_count + 1];
        for config in configs.iter() {
            if ambig_alts.contains(&config.alt) && config.alt <= alt_count {
                let slot = &mut alt_to_pred[config.alt];
                *slot = Some(match slot.take() {
                    None => config.semantic_context.clone(),
                    Some(existing) => SemanticContext::or(&existing, &config.semantic_context),
                });
            }
        }
        let resolved: Vec<SemanticContext> = alt_to_pred.into_iter().map(Option::unwrap_or_default).collect();
        let guarded = resolved.iter().skip(1).filter(|pred| !pred.is_none()).count();
        if guarded == 0 {
            None
        } else {
            Some(resolved)
        }
    }

    fn predicate_predictions(ambig_alts: &AltSet, alt_to_pred: &[SemanticContext]) -> Option<Vec<PredPrediction>> {
        let mut pairs = Vec::new();
        let mut contains_predicate = false;
        for (alt, pred) in alt_to_pred.iter().enumerate().skip(1) {
            if ambig_alts.contains(&alt) {
                pairs.push(PredPrediction { pred: pred.clone(), alt });
            }
            if !pred.is_none() {
                contains_predicate = true;
            }
        }
        contains_predicate.then_some(pairs)
    }

    /// Alternatives whose predicates hold. With `complete` false, stops at the first.
    fn eval_predicates(run: &mut Prediction<'_>, predicates: &[PredPrediction], complete: bool) -> AltSet {
        let mut alts = AltSet::new();
        for pair in predicates {
            if pair.pred.is_none() || run.eval(&pair.pred) {
                alts.insert(pair.alt);
                if !complete {
                    break;
                }
            }
        }
        alts
    }

    fn exec_atn_with_full_context(
        &mut self,
        run: &mut Prediction<'_>,
        s0: AtnConfigSet,
    ) -> Result<usize, Failure> {
        let decision = run.dfa.decision;
        let mut found_exact_ambig = false;
        let mut previous = s0;
        let start_index = run.start_index;
        run.seek(start_index);
        let mut t = run.la1();
        let predicted;
        let mut reach;
        loop {
            if let Some(info) = self.stats.get_mut(decision) {
                info.ll_lookahead += 1;
            }
            reach = match self.compute_reach_set(run, &previous, t, true) {
                Some(reach) => reach,
                None => {
                    let error = self.no_viable_alt(run, &previous);
                    run.seek(run.start_index);
                    let alt = self.syn_valid_or_sem_invalid_alt(run, &previous);
                    if alt != INVALID_ALT_NUMBER {
                        return Ok(alt);
                    }
                    return Err(error.into());
                }
            };
            let subsets = reach.conflicting_alt_subsets();
            reach.unique_alt = reach.unique_alt();
            if reach.unique_alt != INVALID_ALT_NUMBER {
                predicted = reach.unique_alt;
                break;
            }
            if self.mode != PredictionMode::LlExactAmbigDetection {
                let alt = mode::resolves_to_just_one_viable_alt(&subsets);
                if alt != INVALID_ALT_NUMBER {
                    predicted = alt;
                    break;
                }
            } else if mode::all_subsets_conflict(&subsets) && mode::all_subsets_equal(&subsets) {
                found_exact_ambig = true;
                predicted = mode::single_viable_alt(&subsets);
                break;
            }
            previous = reach;
            if t != EOF {
                run.host.input().consume();
                t = run.la1();
            }
        }

        let stop_index = run.index();
        let reach = Arc::new(reach);
        if reach.unique_alt != INVALID_ALT_NUMBER {
            self.report_context_sensitivity(run, predicted, &reach, stop_index);
            return Ok(predicted);
        }
        self.report_ambiguity(run, stop_index, found_exact_ambig, reach.alts(), &reach);
        Ok(predicted)
    }

    fn compute_reach_set(
        &self,
        run: &mut Prediction<'_>,
        closure: &AtnConfigSet,
        t: i32,
        full_ctx: bool,
    ) -> Option<AtnConfigSet> {
        let contexts = self.contexts();
        let mut intermediate = AtnConfigSet::new(full_ctx);
        let mut skipped_stop_states: Vec<AtnConfig> = Vec::new();

        for config in closure.iter() {
            let state = self.atn.state(config.state);
            if state.is_rule_stop() {
                if full_ctx || t == EOF {
                    skipped_stop_states.push(config.clone());
                }
                continue;
            }
            for transition in state.transitions() {
                if transition.matches(t, 0, self.atn.max_token_type) {
                    intermediate.add(config.moved_to(transition.target()), contexts, &mut run.merges);
                }
            }
        }

        // a single thread, or threads that all agree, need no closure
        let mut reach = None;
        if skipped_stop_states.is_empty()
            && t != EOF
            && (intermediate.len() == 1 || intermediate.unique_alt() != INVALID_ALT_NUMBER)
        {
            reach = Some(intermediate.clone());
        }
        let reached_directly = reach.is_some();
        let mut reach = match reach {
            Some(reach) => reach,
            None => {
                let mut reach = AtnConfigSet::new(full_ctx);
                let mut busy = ClosureBusy::new();
                let treat_eof_as_epsilon = t == EOF;
                for config in intermediate.iter() {
                    self.closure(run, config.clone(), &mut reach, &mut busy, false, full_ctx, treat_eof_as_epsilon);
                }
                reach
            }
        };

        if t == EOF {
            reach = self.remove_all_configs_not_in_rule_stop_state(run, reach, reached_directly);
        }

        if !skipped_stop_states.is_empty() && (!full_ctx || !reach.has_config_in_rule_stop_state(&self.atn)) {
            for config in skipped_stop_states {
                reach.add(config, contexts, &mut run.merges);
            }
        }

        if reach.is_empty() {
            None
        } else {
            Some(reach)
        }
    }

    /// Keeps the configurations that finished their rule. With `look_to_end_of_rule`,
    /// configurations that can still reach the rule end without consuming input are moved
    /// there.
    fn remove_all_configs_not_in_rule_stop_state(
        &self,
        run: &mut Prediction<'_>,
        configs: AtnConfigSet,
        look_to_end_of_rule: bool,
    ) -> AtnConfigSet {
        if configs.all_configs_in_rule_stop_states(&self.atn) {
            return configs;
        }
        let contexts = self.contexts();
        let mut result = AtnConfigSet::new(configs.full_ctx);
        for config in configs.iter() {
            let state = self.atn.state(config.state);
            if state.is_rule_stop() {
                result.add(config.clone(), contexts, &mut run.merges);
                continue;
            }
            if look_to_end_of_rule
                && state.only_has_epsilon_transitions()
                && self.atn.next_tokens(config.state).contains(crate::token::EPSILON)
            {
                if let Some(stop) = self.atn.rule_stop_state(state.rule_index) {
                    result.add(config.moved_to(stop), contexts, &mut run.merges);
                }
            }
        }
        result
    }

    fn compute_start_state(
        &self,
        run: &mut Prediction<'_>,
        decision_state: usize,
        initial_context: ContextId,
        full_ctx: bool,
    ) -> AtnConfigSet {
        let mut configs = AtnConfigSet::new(full_ctx);
        for (i, transition) in self.atn.state(decision_state).transitions().iter().enumerate() {
            let config = AtnConfig::new(transition.target(), i + 1, initial_context);
            let mut busy = ClosureBusy::new();
            self.closure(run, config, &mut configs, &mut busy, true, full_ctx, false);
        }
        configs
    }

    /// Drops the alternatives of a precedence decision that the current precedence rules
    /// out, along with every other alternative that duplicates a surviving alternative 1
    /// thread (same state and stack).
    fn apply_precedence_filter(&self, run: &mut Prediction<'_>, configs: &AtnConfigSet) -> AtnConfigSet {
        let contexts = self.contexts();
        let mut states_from_alt1: HashMap<usize, ContextId> = HashMap::new();
        let mut filtered = AtnConfigSet::new(configs.full_ctx);
        for config in configs.iter().filter(|c| c.alt == 1) {
            let outer = run.outer;
            let Some(updated) = config.semantic_context.eval_precedence(&mut *run, outer) else {
                continue;
            };
            states_from_alt1.insert(config.state, config.context);
            let config = if updated != config.semantic_context {
                config.clone().with_semantic_context(updated)
            } else {
                config.clone()
            };
            filtered.add(config, contexts, &mut run.merges);
        }
        for config in configs.iter().filter(|c| c.alt != 1) {
            if !config.precedence_filter_suppressed && states_from_alt1.get(&config.state) == Some(&config.context) {
                continue;
            }
            filtered.add(config.clone(), contexts, &mut run.merges);
        }
        filtered
    }

    #[allow(clippy::too_many_arguments)]
    fn closure(
        &self,
        run: &mut Prediction<'_>,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        busy: &mut ClosureBusy,
        collect_predicates: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) {
        self.closure_checking_stop_state(run, config, configs, busy, collect_predicates, full_ctx, 0, treat_eof_as_epsilon);
    }

    #[allow(clippy::too_many_arguments)]
    fn closure_checking_stop_state(
        &self,
        run: &mut Prediction<'_>,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        busy: &mut ClosureBusy,
        collect_predicates: bool,
        full_ctx: bool,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) {
        let contexts = self.contexts();
        if self.atn.state(config.state).is_rule_stop() {
            if !config.context.is_empty() {
                let context = contexts.get(config.context);
                for i in 0..context.len() {
                    let return_state = context.return_state(i);
                    if return_state == EMPTY_RETURN_STATE {
                        if full_ctx {
                            configs.add(config.clone().with_context(ContextId::EMPTY), contexts, &mut run.merges);
                        } else {
                            // no caller known: follow every return edge
                            self.closure_inner(run, config.clone(), configs, busy, collect_predicates, full_ctx, depth, treat_eof_as_epsilon);
                        }
                        continue;
                    }
                    let returned = AtnConfig {
                        state: return_state,
                        context: context.parent(i),
                        lexer_action_executor: None,
                        passed_through_non_greedy: false,
                        ..config.clone()
                    };
                    self.closure_checking_stop_state(
                        run,
                        returned,
                        configs,
                        busy,
                        collect_predicates,
                        full_ctx,
                        depth - 1,
                        treat_eof_as_epsilon,
                    );
                }
                return;
            }
            if full_ctx {
                configs.add(config, contexts, &mut run.merges);
                return;
            }
        }
        self.closure_inner(run, config, configs, busy, collect_predicates, full_ctx, depth, treat_eof_as_epsilon);
    }

    #[allow(clippy::too_many_arguments)]
    fn closure_inner(
        &self,
        run: &mut Prediction<'_>,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        busy: &mut ClosureBusy,
        collect_predicates: bool,
        full_ctx: bool,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) {
        let atn = Arc::clone(&self.atn);
        let state = atn.state(config.state);
        if !state.only_has_epsilon_transitions() {
            // EOF edges can act as both epsilon and symbol edges, so keep walking below
            configs.add(config.clone(), self.contexts(), &mut run.merges);
        }
        let decision_rule = atn.state(run.dfa.atn_start_state).rule_index;
        for transition in state.transitions() {
            let continue_collecting = collect_predicates && !matches!(transition, Transition::Action { .. });
            let Some(mut target) = self.epsilon_target(
                run,
                &config,
                transition,
                continue_collecting,
                depth == 0,
                full_ctx,
                treat_eof_as_epsilon,
            ) else {
                continue;
            };
            let mut new_depth = depth;
            if state.is_rule_stop() {
                // fell off the end of the decision rule into an unknown caller
                if run.dfa.is_precedence_dfa() {
                    if let Transition::Epsilon {
                        outermost_precedence_return: Some(rule),
                        ..
                    } = transition
                    {
                        if *rule == decision_rule {
                            target.precedence_filter_suppressed = true;
                        }
                    }
                }
                target.reaches_into_outer_context += 1;
                if !busy.insert(target.clone()) {
                    continue;
                }
                configs.dips_into_outer_context = true;
                new_depth -= 1;
            } else {
                if !transition.is_epsilon() && !busy.insert(target.clone()) {
                    continue;
                }
                if matches!(transition, Transition::Rule { .. }) && new_depth >= 0 {
                    new_depth += 1;
                }
            }
            self.closure_checking_stop_state(
                run,
                target,
                configs,
                busy,
                continue_collecting,
                full_ctx,
                new_depth,
                treat_eof_as_epsilon,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn epsilon_target(
        &self,
        run: &mut Prediction<'_>,
        config: &AtnConfig,
        transition: &Transition,
        collect_predicates: bool,
        in_context: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) -> Option<AtnConfig> {
        match transition {
            Transition::Rule { target, follow_state, .. } => {
                let context = self.contexts().singleton(config.context, *follow_state);
                Some(config.moved_to(*target).with_context(context))
            }
            Transition::Precedence { target, precedence } => {
                let pred = SemanticContext::Precedence(*precedence);
                self.predicate_target(run, config, *target, pred, collect_predicates && in_context, full_ctx)
            }
            Transition::Predicate {
                target,
                rule_index,
                pred_index,
                ctx_dependent,
            } => {
                let pred = SemanticContext::Predicate {
                    rule_index: *rule_index,
                    pred_index: *pred_index,
                    ctx_dependent: *ctx_dependent,
                };
                let collect = collect_predicates && (!ctx_dependent || in_context);
                self.predicate_target(run, config, *target, pred, collect, full_ctx)
            }
            Transition::Action { target, .. } | Transition::Epsilon { target, .. } => Some(config.moved_to(*target)),
            Transition::Atom { target, .. } | Transition::Range { target, .. } | Transition::Set { target, .. } => {
                if treat_eof_as_epsilon && transition.matches(EOF, 0, 1) {
                    Some(config.moved_to(*target))
                } else {
                    None
                }
            }
            Transition::NotSet { .. } | Transition::Wildcard { .. } => None,
        }
    }

    /// Crossing a predicate: during full LL it is evaluated on the spot (with the input
    /// at the decision); during SLL it is recorded on the configuration.
    fn predicate_target(
        &self,
        run: &mut Prediction<'_>,
        config: &AtnConfig,
        target: usize,
        pred: SemanticContext,
        collect: bool,
        full_ctx: bool,
    ) -> Option<AtnConfig> {
        if !collect {
            return Some(config.moved_to(target));
        }
        if full_ctx {
            let current = run.index();
            let start_index = run.start_index;
            run.seek(start_index);
            let holds = run.eval(&pred);
            run.seek(current);
            return holds.then(|| config.moved_to(target));
        }
        let combined = SemanticContext::and(&config.semantic_context, &pred);
        Some(config.moved_to(target).with_semantic_context(combined))
    }

    /// On a dead end, the alternative that already finished the decision rule (or fell
    /// into the caller), preferring threads whose predicates hold. Lets the parser take
    /// that alternative and report the error later, at a better spot.
    fn syn_valid_or_sem_invalid_alt(&self, run: &mut Prediction<'_>, configs: &AtnConfigSet) -> usize {
        let (valid, invalid): (Vec<&AtnConfig>, Vec<&AtnConfig>) = configs
            .iter()
            .partition(|config| config.semantic_context.is_none() || run.eval(&config.semantic_context));
        let alt = self.alt_that_finished_decision_entry_rule(&valid);
        if alt != INVALID_ALT_NUMBER {
            return alt;
        }
        self.alt_that_finished_decision_entry_rule(&invalid)
    }

    fn alt_that_finished_decision_entry_rule(&self, configs: &[&AtnConfig]) -> usize {
        configs
            .iter()
            .filter(|config| {
                config.reaches_into_outer_context > 0
                    || (self.atn.state(config.state).is_rule_stop()
                        && self.contexts().get(config.context).has_empty_path())
            })
            .map(|config| config.alt)
            .min()
            .unwrap_or(INVALID_ALT_NUMBER)
    }

    fn no_viable_alt(&self, run: &mut Prediction<'_>, configs: &AtnConfigSet) -> RecognitionError {
        let start_token = run
            .host
            .input()
            .get(run.start_index)
            .cloned()
            .unwrap_or_else(|| Token::eof(None, 0, 0, 0));
        let offending = run.host.input().lt(1).cloned();
        let state = run.host.current_state();
        RecognitionError::new(RecognitionErrorKind::NoViableAlt {
            start_token,
            dead_end_configs: Some(Arc::new(configs.clone())),
        })
        .with_token(offending)
        .with_state(state, run.outer)
    }

    fn decision_rule_name(&self, run: &Prediction<'_>) -> String {
        run.host.rule_name(self.atn.state(run.dfa.atn_start_state).rule_index)
    }

    fn input_text(run: &mut Prediction<'_>, stop_index: usize) -> String {
        let start = run.start_index;
        run.host.input().text_range(start..stop_index + 1)
    }

    fn report_attempting_full_context(
        &self,
        run: &mut Prediction<'_>,
        conflicting_alts: Option<AltSet>,
        configs: &Arc<AtnConfigSet>,
        stop_index: usize,
    ) {
        let report = FullContextReport {
            decision: run.dfa.decision,
            rule_name: self.decision_rule_name(run),
            start_index: run.start_index,
            stop_index,
            input_text: Self::input_text(run, stop_index),
            conflicting_alts,
            configs: Arc::clone(configs),
        };
        log::debug!("attempting full context at decision {}: '{}'", report.decision, report.input_text);
        run.host.listeners().report_attempting_full_context(&report);
    }

    fn report_context_sensitivity(
        &mut self,
        run: &mut Prediction<'_>,
        prediction: usize,
        configs: &Arc<AtnConfigSet>,
        stop_index: usize,
    ) {
        if let Some(info) = self.stats.get_mut(run.dfa.decision) {
            info.context_sensitivities += 1;
        }
        let report = ContextSensitivityReport {
            decision: run.dfa.decision,
            rule_name: self.decision_rule_name(run),
            start_index: run.start_index,
            stop_index,
            input_text: Self::input_text(run, stop_index),
            prediction,
            configs: Arc::clone(configs),
        };
        run.host.listeners().report_context_sensitivity(&report);
    }

    fn report_ambiguity(
        &mut self,
        run: &mut Prediction<'_>,
        stop_index: usize,
        exact: bool,
        ambig_alts: AltSet,
        configs: &Arc<AtnConfigSet>,
    ) {
        if let Some(info) = self.stats.get_mut(run.dfa.decision) {
            info.ambiguities += 1;
        }
        let report = AmbiguityReport {
            decision: run.dfa.decision,
            rule_name: self.decision_rule_name(run),
            start_index: run.start_index,
            stop_index,
            input_text: Self::input_text(run, stop_index),
            exact,
            ambig_alts,
            configs: Arc::clone(configs),
        };
        log::debug!(
            "ambiguity at decision {} ({}): alts {:?}, input '{}'",
            report.decision,
            report.rule_name,
            report.ambig_alts,
            report.input_text
        );
        run.host.listeners().report_ambiguity(&report);
    }
}

impl std::fmt::Debug for ParserAtnSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserAtnSimulator")
            .field("mode", &self.mode)
            .field("decisions", &self.stats.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::testing::{calc_tokens, grammars};

    fn pred(pred_index: usize) -> SemanticContext {
        SemanticContext::Predicate {
            rule_index: 0,
            pred_index,
            ctx_dependent: false,
        }
    }

    #[test]
    fn test_unguarded_alternatives_need_no_predicates() {
        let contexts = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let mut configs = AtnConfigSet::new(false);
        configs.add(AtnConfig::new(3, 1, ContextId::EMPTY), &contexts, &mut merges);
        configs.add(AtnConfig::new(3, 2, ContextId::EMPTY), &contexts, &mut merges);
        let alts: AltSet = [1, 2].into_iter().collect();
        assert!(ParserAtnSimulator::preds_for_ambig_alts(&alts, &configs, 2).is_none());
    }

    #[test]
    fn test_predicates_are_collected_per_alternative() {
        let contexts = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let mut configs = AtnConfigSet::new(false);
        configs.add(
            AtnConfig::new(3, 1, ContextId::EMPTY).with_semantic_context(pred(0)),
            &contexts,
            &mut merges,
        );
        configs.add(AtnConfig::new(3, 2, ContextId::EMPTY), &contexts, &mut merges);
        let alts: AltSet = [1, 2].into_iter().collect();
        let alt_to_pred = ParserAtnSimulator::preds_for_ambig_alts(&alts, &configs, 2).unwrap();
        assert_eq!(alt_to_pred[1], pred(0));
        assert!(alt_to_pred[2].is_none());
        let pairs = ParserAtnSimulator::predicate_predictions(&alts, &alt_to_pred).unwrap();
        let rendered: Vec<String> = pairs.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["({0:0}?, 1)".to_string(), "(true, 2)".to_string()]);
    }

    #[test]
    fn test_closing_a_closed_set_adds_nothing() {
        for grammar in [
            grammars::expression(),
            grammars::ambiguous(),
            grammars::predicated(),
            grammars::two_token_choice(),
        ] {
            let simulator = ParserAtnSimulator::new(grammar.shared_atn(), Arc::clone(grammar.dfa_cache()), PredictionMode::Ll);
            let mut parser = Parser::new(grammar.clone(), Box::new(calc_tokens("1")));
            for dfa in grammar.dfa_cache().dfas() {
                for full_ctx in [false, true] {
                    let mut run = Prediction {
                        host: &mut parser,
                        dfa: Arc::clone(dfa),
                        start_index: 0,
                        outer: None,
                        merges: MergeCache::new(),
                    };
                    let closed = simulator.compute_start_state(&mut run, dfa.atn_start_state, ContextId::EMPTY, full_ctx);
                    assert!(!closed.is_empty());
                    let mut reclosed = AtnConfigSet::new(full_ctx);
                    for config in closed.iter() {
                        let mut busy = ClosureBusy::new();
                        simulator.closure(&mut run, config.clone(), &mut reclosed, &mut busy, true, full_ctx, false);
                    }
                    assert_eq!(
                        reclosed.configs(),
                        closed.configs(),
                        "decision {} full_ctx {}: {} vs {}",
                        dfa.decision,
                        full_ctx,
                        reclosed,
                        closed
                    );
                }
            }
        }
    }
}
