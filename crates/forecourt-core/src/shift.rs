//! # Shift Cash Reconciler
//!
//! Folds one shift's ledger into inflow, outflow and shortage figures.
//!
//! ## The Settlement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shift Settlement                                 │
//! │                                                                         │
//! │  CASH IN                         ACCOUNTED FOR                          │
//! │  ───────                         ─────────────                          │
//! │  liquid sales                    credit sales + lube (Credit)  credit   │
//! │  lube sales (Cash)               swipes − recoveries (Swipe)   swipe    │
//! │  recoveries (Cash)               expenses (Cash-Out)                    │
//! │  expenses (Cash-In)              cash handovers                outflow  │
//! │        │                                  │                             │
//! │        └────────► shift_short = in − (credit + swipe + outflow)        │
//! │                                  │                                      │
//! │   previous cumulative shortage ──┴──► overall_shortage ──► next shift   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A positive shortage means cash is missing.
//!
//! ## Partial Ledgers
//! Amounts are kept exactly as typed. A blank amount counts as zero. An
//! unreadable amount also counts as zero, is logged, and is listed in
//! [`ShiftSummary::malformed`]. Unreadable means non-numeric, or large enough
//! to push the shift's amounts past [`MAX_AMOUNT_CENTS`] in total. Summarizing
//! never fails, so a shift that is still being entered always has a summary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, FieldMessage};
use crate::money::{Money, MAX_AMOUNT_CENTS};

// =============================================================================
// Sub-modes
// =============================================================================

/// How a lube sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LubeMode {
    Cash,
    Credit,
}

/// How a credit customer settled an outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecoveryMode {
    Cash,
    Swipe,
}

/// Whether an expense line brought cash into or took cash out of the till.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseDirection {
    #[serde(rename = "Cash-In")]
    CashIn,
    #[serde(rename = "Cash-Out")]
    CashOut,
}

impl LubeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LubeMode::Cash => "Cash",
            LubeMode::Credit => "Credit",
        }
    }
}

impl RecoveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryMode::Cash => "Cash",
            RecoveryMode::Swipe => "Swipe",
        }
    }
}

impl ExpenseDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseDirection::CashIn => "Cash-In",
            ExpenseDirection::CashOut => "Cash-Out",
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// One line item as entered. `amount` is raw operator text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
}

impl LedgerLine {
    pub fn new(amount: impl Into<String>) -> Self {
        LedgerLine {
            description: None,
            amount: Some(amount.into()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A line item in a category split by a sub-mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalLine<M> {
    pub mode: M,
    #[serde(flatten)]
    pub line: LedgerLine,
}

impl<M> ModalLine<M> {
    pub fn new(mode: M, amount: impl Into<String>) -> Self {
        ModalLine {
            mode,
            line: LedgerLine::new(amount),
        }
    }
}

/// Everything one employee recorded for one shift on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftLedger {
    pub shift_id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub liquid_sales: Vec<LedgerLine>,
    #[serde(default)]
    pub lube_sales: Vec<ModalLine<LubeMode>>,
    #[serde(default)]
    pub credit_sales: Vec<LedgerLine>,
    #[serde(default)]
    pub recoveries: Vec<ModalLine<RecoveryMode>>,
    #[serde(default)]
    pub swipes: Vec<LedgerLine>,
    #[serde(default)]
    pub expenses: Vec<ModalLine<ExpenseDirection>>,
    #[serde(default)]
    pub cash_handovers: Vec<LedgerLine>,
}

impl ShiftLedger {
    /// An empty ledger, as when a shift is first opened.
    pub fn new(shift_id: impl Into<String>, employee_id: impl Into<String>, date: NaiveDate) -> Self {
        ShiftLedger {
            shift_id: shift_id.into(),
            employee_id: employee_id.into(),
            date,
            liquid_sales: Vec::new(),
            lube_sales: Vec::new(),
            credit_sales: Vec::new(),
            recoveries: Vec::new(),
            swipes: Vec::new(),
            expenses: Vec::new(),
            cash_handovers: Vec::new(),
        }
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Per-category totals behind a [`ShiftSummary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub liquid_sale: Money,
    pub lube_cash: Money,
    pub lube_credit: Money,
    pub credit_sale: Money,
    pub recovery_cash: Money,
    pub recovery_swipe: Money,
    pub swipe: Money,
    pub expense_cash_in: Money,
    pub expense_cash_out: Money,
    pub cash_handover: Money,
}

/// Derived figures for one shift. Has no identity of its own; recompute it
/// whenever the ledger changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSummary {
    pub shift_id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    /// Liquid sales, cash lube, cash recoveries and cash-in expenses.
    #[serde(rename = "sale")]
    pub cash_inflow: Money,
    /// Total credit given.
    pub credit: Money,
    /// All recoveries, cash and swipe.
    pub recovery: Money,
    /// Net swipe settlement (swipes less swipe recoveries).
    pub swipe: Money,
    /// Cash-out expenses and cash handovers.
    #[serde(rename = "expense")]
    pub cash_outflow: Money,
    pub shift_short: Money,
    pub previous_cumulative_shortage: Money,
    pub overall_shortage: Money,
    pub breakdown: CategoryTotals,
    /// Lines whose amount could not be read and were counted as zero.
    pub malformed: Vec<FieldMessage>,
}

// =============================================================================
// Reconciler
// =============================================================================

/// Reads amounts, coercing unreadable ones to zero and remembering them.
#[derive(Default)]
struct AmountReader {
    /// Sum of the magnitudes accepted so far, never above `MAX_AMOUNT_CENTS`.
    magnitude: i64,
    malformed: Vec<FieldMessage>,
}

impl AmountReader {
    fn read(&mut self, category: &str, index: usize, line: &LedgerLine) -> Money {
        let Some(raw) = line.amount.as_deref() else {
            return Money::zero();
        };

        match Money::parse("amount", raw) {
            Ok(amount) => {
                let amount = amount.unwrap_or_default();
                if self.accept(amount) {
                    amount
                } else {
                    self.reject(category, index, raw)
                }
            }
            Err(_) => self.reject(category, index, raw),
        }
    }

    fn accept(&mut self, amount: Money) -> bool {
        match self.magnitude.checked_add(amount.cents().saturating_abs()) {
            Some(magnitude) if magnitude <= MAX_AMOUNT_CENTS => {
                self.magnitude = magnitude;
                true
            }
            _ => false,
        }
    }

    fn reject(&mut self, category: &str, index: usize, raw: &str) -> Money {
        let err = CoreError::MalformedLedgerEntry {
            category: category.to_string(),
            index,
            raw: raw.to_string(),
        };
        warn!(category, index, raw, "Unreadable ledger amount counted as zero");
        self.malformed.push(err.field_message());
        Money::zero()
    }

    fn total(&mut self, category: &str, lines: &[LedgerLine]) -> Money {
        lines
            .iter()
            .enumerate()
            .map(|(index, line)| self.read(category, index, line))
            .sum()
    }

    fn total_where<M: PartialEq>(&mut self, category: &str, lines: &[ModalLine<M>], mode: M) -> Money {
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.mode == mode)
            .map(|(index, line)| self.read(category, index, &line.line))
            .sum()
    }
}

/// Summarizes one shift.
///
/// `previous_cumulative_shortage` is the running shortage carried in from
/// the employee's earlier shifts. Pass `Money::zero()` only for a first shift.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use forecourt_core::money::Money;
/// use forecourt_core::shift::{summarize, LedgerLine, ShiftLedger};
///
/// let mut ledger = ShiftLedger::new("morning", "E1", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
/// ledger.liquid_sales.push(LedgerLine::new("5000"));
/// ledger.cash_handovers.push(LedgerLine::new("4900"));
///
/// let summary = summarize(&ledger, Money::zero());
/// assert_eq!(summary.shift_short, Money::from_major(100));
/// ```
pub fn summarize(ledger: &ShiftLedger, previous_cumulative_shortage: Money) -> ShiftSummary {
    let mut reader = AmountReader::default();

    // Modal categories are indexed by position in the full list so the
    // field path points at the line the operator sees.
    let breakdown = CategoryTotals {
        liquid_sale: reader.total("liquid_sales", &ledger.liquid_sales),
        lube_cash: reader.total_where("lube_sales", &ledger.lube_sales, LubeMode::Cash),
        lube_credit: reader.total_where("lube_sales", &ledger.lube_sales, LubeMode::Credit),
        credit_sale: reader.total("credit_sales", &ledger.credit_sales),
        recovery_cash: reader.total_where("recoveries", &ledger.recoveries, RecoveryMode::Cash),
        recovery_swipe: reader.total_where("recoveries", &ledger.recoveries, RecoveryMode::Swipe),
        swipe: reader.total("swipes", &ledger.swipes),
        expense_cash_in: reader.total_where("expenses", &ledger.expenses, ExpenseDirection::CashIn),
        expense_cash_out: reader.total_where("expenses", &ledger.expenses, ExpenseDirection::CashOut),
        cash_handover: reader.total("cash_handovers", &ledger.cash_handovers),
    };

    let swipe = breakdown.swipe - breakdown.recovery_swipe;
    let inflow = breakdown.liquid_sale + breakdown.lube_cash + breakdown.recovery_cash + breakdown.expense_cash_in;
    let credit = breakdown.credit_sale + breakdown.lube_credit;
    let outflow = breakdown.expense_cash_out + breakdown.cash_handover;

    let shift_short = inflow - (credit + swipe + outflow);
    let overall_shortage = previous_cumulative_shortage + shift_short;

    debug!(
        shift_id = %ledger.shift_id,
        employee_id = %ledger.employee_id,
        date = %ledger.date,
        %inflow,
        %credit,
        %swipe,
        %outflow,
        %shift_short,
        %overall_shortage,
        "Shift summarized"
    );

    ShiftSummary {
        shift_id: ledger.shift_id.clone(),
        employee_id: ledger.employee_id.clone(),
        date: ledger.date,
        cash_inflow: inflow,
        credit,
        recovery: breakdown.recovery_cash + breakdown.recovery_swipe,
        swipe,
        cash_outflow: outflow,
        shift_short,
        previous_cumulative_shortage,
        overall_shortage,
        breakdown,
        malformed: reader.malformed,
    }
}

/// Summarizes shifts in order, threading each overall shortage into the next.
///
/// ```text
/// opening ──► summarize(L1) ──► overall₁ ──► summarize(L2) ──► overall₂ ...
/// ```
pub fn summarize_sequence(ledgers: &[ShiftLedger], opening_cumulative_shortage: Money) -> Vec<ShiftSummary> {
    let mut carried = opening_cumulative_shortage;

    ledgers
        .iter()
        .map(|ledger| {
            let summary = summarize(ledger, carried);
            carried = summary.overall_shortage;
            summary
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
