//! Balance Calculator: pure read-side folds over the three logs.
//!
//! `remaining = entitlement + transfers_in - transfers_out - consumed`, with
//! soft-deleted rows excluded from every sum and a missing entitlement read
//! as zero.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use quotaledger_core::{CategoryCode, GroupId, HolderId, Period, TenantId};

use crate::consumption::Consumption;
use crate::entitlement::{BalanceKey, Entitlement};
use crate::movement::Movement;
use crate::reference::Holder;

/// Sums of the active log rows for one key.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub transfers_in: i64,
    pub transfers_out: i64,
    pub consumed: i64,
}

impl LedgerTotals {
    pub fn net_transfers(&self) -> i64 {
        self.transfers_in - self.transfers_out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub holder: HolderId,
    pub category: CategoryCode,
    pub period: Period,
    pub entitlement: i64,
    pub transfers_in: i64,
    pub transfers_out: i64,
    pub consumed: i64,
    pub remaining: i64,
}

impl Balance {
    pub fn from_parts(
        holder: HolderId,
        category: CategoryCode,
        period: Period,
        entitlement: Option<i64>,
        totals: LedgerTotals,
    ) -> Self {
        let entitlement = entitlement.unwrap_or(0);
        Self {
            holder,
            category,
            period,
            entitlement,
            transfers_in: totals.transfers_in,
            transfers_out: totals.transfers_out,
            consumed: totals.consumed,
            remaining: entitlement + totals.transfers_in - totals.transfers_out - totals.consumed,
        }
    }

    pub fn for_key(key: &BalanceKey, entitlement: Option<i64>, totals: LedgerTotals) -> Self {
        Self::from_parts(key.holder.clone(), key.category.clone(), key.period, entitlement, totals)
    }

    pub fn is_overage(&self) -> bool {
        self.remaining < 0
    }

    /// Remaining as a percentage of entitlement; `None` without an entitlement.
    pub fn pct_remaining(&self) -> Option<f64> {
        if self.entitlement <= 0 {
            return None;
        }
        Some(self.remaining as f64 / self.entitlement as f64 * 100.0)
    }

    pub fn risk(&self) -> RiskLevel {
        RiskLevel::from_pct_remaining(self.pct_remaining())
    }
}

/// Dashboard risk band derived from percent remaining.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Ok,
    Warning,
    Critical,
    #[serde(rename = "n/a")]
    NotApplicable,
}

impl RiskLevel {
    pub const CRITICAL_BELOW_PCT: f64 = 10.0;
    pub const WARNING_BELOW_PCT: f64 = 50.0;

    pub fn from_pct_remaining(pct: Option<f64>) -> Self {
        match pct {
            None => RiskLevel::NotApplicable,
            Some(p) if p < Self::CRITICAL_BELOW_PCT => RiskLevel::Critical,
            Some(p) if p < Self::WARNING_BELOW_PCT => RiskLevel::Warning,
            Some(_) => RiskLevel::Ok,
        }
    }
}

/// Balances of one group (coalition) for one category, summed over members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBalance {
    /// `None` collects holders without a group.
    pub group: Option<GroupId>,
    pub category: CategoryCode,
    pub period: Period,
    pub holders: usize,
    pub entitlement: i64,
    pub transfers_in: i64,
    pub transfers_out: i64,
    pub consumed: i64,
    pub remaining: i64,
}

pub struct BalanceCalculator;

impl BalanceCalculator {
    /// Fold the active rows that touch `key`.
    pub fn totals_for<'a>(
        key: &BalanceKey,
        movements: impl IntoIterator<Item = &'a Movement>,
        consumptions: impl IntoIterator<Item = &'a Consumption>,
    ) -> LedgerTotals {
        let mut totals = LedgerTotals::default();

        for m in movements {
            if !m.is_active()
                || m.tenant_id != key.tenant_id
                || m.category != key.category
                || m.period != key.period
            {
                continue;
            }
            if m.destination == key.holder {
                totals.transfers_in += m.amount;
            }
            if m.source == key.holder {
                totals.transfers_out += m.amount;
            }
        }

        for c in consumptions {
            if c.is_active()
                && c.tenant_id == key.tenant_id
                && c.holder == key.holder
                && c.category == key.category
                && c.period == key.period
            {
                totals.consumed += c.amount;
            }
        }

        totals
    }

    pub fn balance<'a>(
        key: &BalanceKey,
        entitlement: Option<&Entitlement>,
        movements: impl IntoIterator<Item = &'a Movement>,
        consumptions: impl IntoIterator<Item = &'a Consumption>,
    ) -> Balance {
        let totals = Self::totals_for(key, movements, consumptions);
        Balance::for_key(key, entitlement.map(|e| e.amount), totals)
    }

    /// Grouped aggregation of every (holder, category) with an entitlement or
    /// any active activity in the period. One pass per log; ordered by
    /// holder then category.
    pub fn period_balances<'a>(
        tenant_id: TenantId,
        period: Period,
        entitlements: impl IntoIterator<Item = &'a Entitlement>,
        movements: impl IntoIterator<Item = &'a Movement>,
        consumptions: impl IntoIterator<Item = &'a Consumption>,
    ) -> Vec<Balance> {
        let mut rows: BTreeMap<(HolderId, CategoryCode), (Option<i64>, LedgerTotals)> = BTreeMap::new();

        for e in entitlements {
            if e.key.tenant_id == tenant_id && e.key.period == period {
                let slot = rows
                    .entry((e.key.holder.clone(), e.key.category.clone()))
                    .or_default();
                slot.0 = Some(e.amount);
            }
        }

        for m in movements {
            if !m.is_active() || m.tenant_id != tenant_id || m.period != period {
                continue;
            }
            rows.entry((m.destination.clone(), m.category.clone()))
                .or_default()
                .1
                .transfers_in += m.amount;
            rows.entry((m.source.clone(), m.category.clone()))
                .or_default()
                .1
                .transfers_out += m.amount;
        }

        for c in consumptions {
            if c.is_active() && c.tenant_id == tenant_id && c.period == period {
                rows.entry((c.holder.clone(), c.category.clone()))
                    .or_default()
                    .1
                    .consumed += c.amount;
            }
        }

        rows.into_iter()
            .map(|((holder, category), (entitlement, totals))| {
                Balance::from_parts(holder, category, period, entitlement, totals)
            })
            .collect()
    }

    /// Roll per-holder balances up by holder group and category.
    pub fn group_rollup(balances: &[Balance], holders: &[Holder]) -> Vec<GroupBalance> {
        let groups: HashMap<&HolderId, Option<&GroupId>> =
            holders.iter().map(|h| (&h.id, h.group.as_ref())).collect();

        let mut rolled: BTreeMap<(Option<GroupId>, CategoryCode), GroupBalance> = BTreeMap::new();
        for b in balances {
            let group = groups.get(&b.holder).copied().flatten().cloned();
            let slot = rolled
                .entry((group.clone(), b.category.clone()))
                .or_insert_with(|| GroupBalance {
                    group,
                    category: b.category.clone(),
                    period: b.period,
                    holders: 0,
                    entitlement: 0,
                    transfers_in: 0,
                    transfers_out: 0,
                    consumed: 0,
                    remaining: 0,
                });
            slot.holders += 1;
            slot.entitlement += b.entitlement;
            slot.transfers_in += b.transfers_in;
            slot.transfers_out += b.transfers_out;
            slot.consumed += b.consumed;
            slot.remaining += b.remaining;
        }

        rolled.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumption::{ConsumptionRequest, ExternalRef};
    use crate::transfer::{check_sufficient, TransferRequest};
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;
    use quotaledger_core::UserId;

    fn holder(id: &str) -> HolderId {
        HolderId::parse(id).unwrap()
    }

    fn pop() -> CategoryCode {
        CategoryCode::parse("POP").unwrap()
    }

    fn period() -> Period {
        Period::new(2026).unwrap()
    }

    fn key(tenant: TenantId, h: &str) -> BalanceKey {
        BalanceKey::new(tenant, holder(h), pop(), period())
    }

    fn transfer(tenant: TenantId, from: &str, to: &str, amount: i64) -> Movement {
        let req = TransferRequest {
            source: holder(from),
            destination: holder(to),
            category: pop(),
            period: period(),
            amount,
            note: None,
            effective_date: None,
        };
        Movement::record(tenant, &req, UserId::new(), Utc::now()).unwrap()
    }

    fn harvest(tenant: TenantId, h: &str, amount: i64, reference: &str) -> Consumption {
        let req = ConsumptionRequest {
            holder: holder(h),
            category: pop(),
            amount,
            event_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            external_ref: ExternalRef::parse(reference).unwrap(),
        };
        Consumption::record(tenant, &req, UserId::new(), Utc::now()).unwrap()
    }

    fn entitlement(tenant: TenantId, h: &str, amount: i64) -> Entitlement {
        Entitlement::open(key(tenant, h), amount, UserId::new(), Utc::now()).unwrap()
    }

    #[test]
    fn worked_example_remaining() {
        let t = TenantId::new();
        let e = entitlement(t, "H1", 10_000);
        let movements = vec![transfer(t, "H1", "H2", 2_000), transfer(t, "H1", "H3", 1_500)];
        let consumptions = vec![harvest(t, "H1", 3_000, "R-1")];

        let b = BalanceCalculator::balance(&key(t, "H1"), Some(&e), &movements, &consumptions);
        assert_eq!(b.entitlement, 10_000);
        assert_eq!(b.transfers_out, 3_500);
        assert_eq!(b.consumed, 3_000);
        assert_eq!(b.remaining, 3_500);
    }

    #[test]
    fn retracted_rows_are_excluded() {
        let t = TenantId::new();
        let e = entitlement(t, "H1", 10_000);
        let mut first = transfer(t, "H1", "H2", 2_000);
        let movements_before = vec![first.clone(), transfer(t, "H1", "H3", 1_500)];
        let consumptions = vec![harvest(t, "H1", 3_000, "R-1")];
        let h2_before = BalanceCalculator::balance(&key(t, "H2"), None, &movements_before, &consumptions);

        first.retract(UserId::new(), Utc::now());
        let movements_after = vec![first, transfer(t, "H1", "H3", 1_500)];

        let h1 = BalanceCalculator::balance(&key(t, "H1"), Some(&e), &movements_after, &consumptions);
        let h2 = BalanceCalculator::balance(&key(t, "H2"), None, &movements_after, &consumptions);
        assert_eq!(h1.remaining, 5_500);
        assert_eq!(h2.remaining, h2_before.remaining - 2_000);
    }

    #[test]
    fn missing_entitlement_reads_as_zero() {
        let t = TenantId::new();
        let b = BalanceCalculator::balance(&key(t, "H9"), None, &[], &[]);
        assert_eq!(b.entitlement, 0);
        assert_eq!(b.remaining, 0);
        assert_eq!(b.risk(), RiskLevel::NotApplicable);
    }

    #[test]
    fn other_tenants_rows_never_count() {
        let t = TenantId::new();
        let other = TenantId::new();
        let movements = vec![transfer(other, "H1", "H2", 500)];
        let consumptions = vec![harvest(other, "H1", 700, "R-9")];
        let b = BalanceCalculator::balance(&key(t, "H1"), None, &movements, &consumptions);
        assert_eq!(b.remaining, 0);
    }

    #[test]
    fn risk_bands_follow_percent_remaining() {
        assert_eq!(RiskLevel::from_pct_remaining(Some(5.0)), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_pct_remaining(Some(-20.0)), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_pct_remaining(Some(10.0)), RiskLevel::Warning);
        assert_eq!(RiskLevel::from_pct_remaining(Some(49.9)), RiskLevel::Warning);
        assert_eq!(RiskLevel::from_pct_remaining(Some(50.0)), RiskLevel::Ok);
    }

    #[test]
    fn period_balances_include_activity_without_entitlement() {
        let t = TenantId::new();
        let entitlements = vec![entitlement(t, "H1", 10_000)];
        let movements = vec![transfer(t, "H1", "H2", 2_000)];
        let consumptions = vec![harvest(t, "H3", 400, "R-2")];

        let rows = BalanceCalculator::period_balances(t, period(), &entitlements, &movements, &consumptions);
        let by_holder: HashMap<_, _> = rows.iter().map(|b| (b.holder.as_str(), b.remaining)).collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(by_holder["H1"], 8_000);
        assert_eq!(by_holder["H2"], 2_000);
        assert_eq!(by_holder["H3"], -400);
    }

    #[test]
    fn group_rollup_sums_members_and_collects_ungrouped() {
        let t = TenantId::new();
        let coop = GroupId::parse("COOP-A").unwrap();
        let holders = vec![
            Holder { tenant_id: t, id: holder("H1"), name: None, group: Some(coop.clone()), active: true },
            Holder { tenant_id: t, id: holder("H2"), name: None, group: Some(coop.clone()), active: true },
            Holder { tenant_id: t, id: holder("H3"), name: None, group: None, active: true },
        ];
        let entitlements = vec![
            entitlement(t, "H1", 1_000),
            entitlement(t, "H2", 2_000),
            entitlement(t, "H3", 500),
        ];
        let movements = vec![transfer(t, "H1", "H2", 300), transfer(t, "H2", "H3", 100)];
        let balances = BalanceCalculator::period_balances(t, period(), &entitlements, &movements, &[]);

        let rolled = BalanceCalculator::group_rollup(&balances, &holders);
        let coop_row = rolled.iter().find(|g| g.group.as_ref() == Some(&coop)).unwrap();
        let loose = rolled.iter().find(|g| g.group.is_none()).unwrap();

        assert_eq!(coop_row.holders, 2);
        assert_eq!(coop_row.entitlement, 3_000);
        assert_eq!(coop_row.remaining, 2_900);
        assert_eq!(loose.remaining, 600);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any sequence of transfers nets to zero across holders and
        /// leaves the period total equal to entitlements minus consumption.
        #[test]
        fn transfers_conserve_entitlement(
            transfers in prop::collection::vec((0usize..4, 0usize..4, 1i64..5_000i64), 0..40),
            retract_mask in prop::collection::vec(any::<bool>(), 40),
        ) {
            let t = TenantId::new();
            let names = ["H1", "H2", "H3", "H4"];
            let entitlements: Vec<_> = names.iter().map(|h| entitlement(t, h, 10_000)).collect();

            let mut movements = Vec::new();
            for (idx, (from, to, amount)) in transfers.into_iter().enumerate() {
                if from == to {
                    continue;
                }
                let mut m = transfer(t, names[from], names[to], amount);
                if retract_mask[idx] {
                    m.retract(UserId::new(), Utc::now());
                }
                movements.push(m);
            }
            let consumptions = vec![harvest(t, "H1", 1_234, "R-P")];

            let balances = BalanceCalculator::period_balances(t, period(), &entitlements, &movements, &consumptions);
            let net: i64 = balances.iter().map(|b| b.transfers_in - b.transfers_out).sum();
            let remaining: i64 = balances.iter().map(|b| b.remaining).sum();

            prop_assert_eq!(net, 0);
            prop_assert_eq!(remaining, 40_000 - 1_234);
        }

        /// Property: admitting proposals only through `check_sufficient` never
        /// drives a holder negative when there is no consumption.
        #[test]
        fn validated_transfers_never_overdraw(
            proposals in prop::collection::vec((0usize..3, 0usize..3, 1i64..8_000i64), 0..60),
        ) {
            let t = TenantId::new();
            let names = ["H1", "H2", "H3"];
            let entitlements: Vec<_> = names.iter().map(|h| entitlement(t, h, 5_000)).collect();
            let mut movements: Vec<Movement> = Vec::new();

            for (from, to, amount) in proposals {
                if from == to {
                    continue;
                }
                let source_key = key(t, names[from]);
                let current = BalanceCalculator::balance(
                    &source_key,
                    entitlements.iter().find(|e| e.key == source_key),
                    &movements,
                    &[],
                );
                if check_sufficient(&current, amount).is_ok() {
                    movements.push(transfer(t, names[from], names[to], amount));
                } else {
                    prop_assert!(amount > current.remaining);
                }
            }

            for b in BalanceCalculator::period_balances(t, period(), &entitlements, &movements, &[]) {
                prop_assert!(b.remaining >= 0);
            }
        }
    }
}
