use crate::chart_of_accounts::AccountKind;
use crate::formula::{CompiledFormula, FormulaError, FormulaTable};
use crate::hierarchy::Hierarchy;
use crate::schema::DataSource;
use crate::utils::{safe_float, split_links};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub account: usize,
    pub period: usize,
}

/// Memoized values for exactly one (chart, data source) pass. A new cache
/// must be created for every pair; account indices and period indices are
/// only meaningful inside the pair that produced them.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    values: HashMap<CacheKey, f64>,
    in_progress: HashSet<CacheKey>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: CacheKey) -> Option<f64> {
        self.values.get(&key).copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Values actually computed (cache misses).
    pub evaluations: usize,
    pub cache_hits: usize,
    pub formula_failures: usize,
    pub cycles_detected: usize,
}

/// Computes account values for one chart against one data source.
///
/// Every failure inside resolution (unknown codes, missing raw data,
/// malformed formulas, division by zero, cycles) degrades to 0.0.
pub struct ValueResolver<'a> {
    hierarchy: &'a Hierarchy<'a>,
    formulas: &'a FormulaTable,
    source: &'a DataSource,
    link_delimiter: char,
    detect_cycles: bool,
    cache: ResolutionCache,
    stats: ResolutionStats,
}

impl<'a> ValueResolver<'a> {
    pub fn new(
        hierarchy: &'a Hierarchy<'a>,
        formulas: &'a FormulaTable,
        source: &'a DataSource,
        cache: ResolutionCache,
    ) -> Self {
        Self {
            hierarchy,
            formulas,
            source,
            link_delimiter: ';',
            detect_cycles: true,
            cache,
            stats: ResolutionStats::default(),
        }
    }

    pub fn with_link_delimiter(mut self, delimiter: char) -> Self {
        self.link_delimiter = delimiter;
        self
    }

    pub fn with_cycle_detection(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn into_cache(self) -> ResolutionCache {
        self.cache
    }

    /// Resolves by code and period label. Unknown codes and periods give 0.
    pub fn resolve_code(&mut self, code: &str, period: &str) -> f64 {
        let Some(period_idx) = self.source.periods.iter().position(|p| p == period) else {
            debug!("Period '{}' is not part of data source '{}'", period, self.source.name);
            return 0.0;
        };
        match self.hierarchy.index_of(code) {
            Some(account) => self.resolve(account, period_idx),
            None => 0.0,
        }
    }

    /// Resolves an account (by index) for a period (by index into the data
    /// source's period list). Out-of-range indices give 0.
    pub fn resolve(&mut self, account: usize, period: usize) -> f64 {
        if account >= self.hierarchy.len() || period >= self.source.periods.len() {
            debug!("No account {} or period {} to resolve; using 0", account, period);
            return 0.0;
        }

        let key = CacheKey { account, period };
        if let Some(value) = self.cache.values.get(&key) {
            self.stats.cache_hits += 1;
            return *value;
        }

        if self.detect_cycles && !self.cache.in_progress.insert(key) {
            let code = &self.hierarchy.account(account).code;
            warn!(
                "{} while resolving data source '{}'; using 0",
                FormulaError::CycleDetected(code.clone()),
                self.source.name
            );
            self.stats.cycles_detected += 1;
            return 0.0;
        }

        self.stats.evaluations += 1;
        let value = match self.hierarchy.account(account).kind {
            AccountKind::Leaf => self.leaf_value(account, period),
            AccountKind::RollUp => self.rollup_value(account, period),
            AccountKind::Formula => self.formula_value(account, period),
        };

        if self.detect_cycles {
            self.cache.in_progress.remove(&key);
        }
        self.cache.values.insert(key, value);
        value
    }

    fn leaf_value(&self, account: usize, period: usize) -> f64 {
        let account = self.hierarchy.account(account);
        let Some(link) = account.data_source_links.get(&self.source.name) else {
            return 0.0;
        };
        if !self.source.has_data() {
            return 0.0;
        }

        let period_label = &self.source.periods[period];
        split_links(link, self.link_delimiter)
            .map(|raw_code| {
                if !self.source.records.contains_key(raw_code) {
                    debug!(
                        "Raw code '{}' linked from account {} not found in data source '{}'",
                        raw_code, account.code, self.source.name
                    );
                }
                safe_float(self.source.value(raw_code, period_label))
            })
            .sum()
    }

    fn rollup_value(&mut self, account: usize, period: usize) -> f64 {
        let hierarchy = self.hierarchy;
        hierarchy
            .children_of(account)
            .iter()
            .map(|&child| self.resolve(child, period))
            .sum()
    }

    fn formula_value(&mut self, account: usize, period: usize) -> f64 {
        let formulas = self.formulas;
        let (formula, targets) = match formulas.get(account) {
            None => return 0.0,
            Some(CompiledFormula::Invalid { .. }) => {
                self.stats.formula_failures += 1;
                return 0.0;
            }
            Some(CompiledFormula::Ready { formula, targets }) => (formula, targets),
        };

        let bindings: Vec<f64> = targets
            .iter()
            .map(|target| match target {
                Some(idx) => self.resolve(*idx, period),
                None => 0.0,
            })
            .collect();

        match formula.evaluate(&bindings) {
            Ok(value) => value,
            Err(error) => {
                self.stats.formula_failures += 1;
                warn!(
                    "Formula '{}' of account {} failed for period '{}' in data source '{}': {}",
                    formula.source(),
                    self.hierarchy.account(account).code,
                    self.source.periods[period],
                    self.source.name,
                    error
                );
                0.0
            }
        }
    }
}
