use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use epistock_core::{
    Aggregate, AggregateRoot, BorrowerId, DomainError, DomainResult, ItemId, LoanId,
};

use crate::validate;

/// Loan period applied when a checkout does not name a due date.
pub const DEFAULT_LOAN_PERIOD_DAYS: u64 = 7;

/// Condition of an equipment unit at checkout or return time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Good,
    Usable,
    Damaged,
}

impl Condition {
    /// Restockable conditions put the unit back on the shelf at return time;
    /// a damaged unit is withheld from stock.
    pub fn is_restockable(self) -> bool {
        matches!(self, Condition::Good | Condition::Usable)
    }
}

/// Loan lifecycle states. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
    Deleted,
}

/// Stock instruction carried by a loan event.
///
/// The aggregate decides the stock effect exactly once, at transition time;
/// the orchestrator only executes it and never re-derives lifecycle logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    Reserve,
    Release,
}

/// Aggregate root: Loan, one PPE unit checked out to one borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    id: LoanId,
    item_id: Option<ItemId>,
    borrower_id: Option<BorrowerId>,
    checked_out_on: Option<NaiveDate>,
    due_on: Option<NaiveDate>,
    returned_on: Option<NaiveDate>,
    condition_out: Option<Condition>,
    condition_in: Option<Condition>,
    status: LoanStatus,
    version: u64,
    created: bool,
}

impl Loan {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: LoanId) -> Self {
        Self {
            id,
            item_id: None,
            borrower_id: None,
            checked_out_on: None,
            due_on: None,
            returned_on: None,
            condition_out: None,
            condition_in: None,
            status: LoanStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LoanId {
        self.id
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    pub fn borrower_id(&self) -> Option<BorrowerId> {
        self.borrower_id
    }

    pub fn checked_out_on(&self) -> Option<NaiveDate> {
        self.checked_out_on
    }

    pub fn due_on(&self) -> Option<NaiveDate> {
        self.due_on
    }

    pub fn returned_on(&self) -> Option<NaiveDate> {
        self.returned_on
    }

    pub fn condition_out(&self) -> Option<Condition> {
        self.condition_out
    }

    pub fn condition_in(&self) -> Option<Condition> {
        self.condition_in
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, LoanStatus::Active)
    }
}

impl AggregateRoot for Loan {
    type Id = LoanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CheckoutItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub loan_id: LoanId,
    pub item_id: ItemId,
    pub borrower_id: BorrowerId,
    pub checked_out_on: NaiveDate,
    /// Defaults to `checked_out_on + DEFAULT_LOAN_PERIOD_DAYS` when absent.
    pub due_on: Option<NaiveDate>,
    pub condition_out: Condition,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordReturn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReturn {
    pub loan_id: LoanId,
    pub returned_on: NaiveDate,
    pub condition_in: Condition,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteLoan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLoan {
    pub loan_id: LoanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanCommand {
    CheckoutItem(CheckoutItem),
    RecordReturn(RecordReturn),
    DeleteLoan(DeleteLoan),
}

/// Event: LoanCheckedOut (stock effect: reserve one unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCheckedOut {
    pub loan_id: LoanId,
    pub item_id: ItemId,
    pub borrower_id: BorrowerId,
    pub checked_out_on: NaiveDate,
    pub due_on: NaiveDate,
    pub condition_out: Condition,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoanReturned (stock effect: release iff `restock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReturned {
    pub loan_id: LoanId,
    pub item_id: ItemId,
    pub returned_on: NaiveDate,
    pub condition_in: Condition,
    /// True when `condition_in` is restockable.
    pub restock: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoanDeleted (stock effect: release iff `restock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDeleted {
    pub loan_id: LoanId,
    pub item_id: ItemId,
    /// True only when the loan was still active at deletion time. A returned
    /// loan's stock was already settled by the return (released for
    /// good/usable, withheld for damaged), so deleting it is stock-neutral.
    pub restock: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanEvent {
    LoanCheckedOut(LoanCheckedOut),
    LoanReturned(LoanReturned),
    LoanDeleted(LoanDeleted),
}

impl LoanEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LoanEvent::LoanCheckedOut(_) => "loan.checked_out",
            LoanEvent::LoanReturned(_) => "loan.returned",
            LoanEvent::LoanDeleted(_) => "loan.deleted",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LoanEvent::LoanCheckedOut(e) => e.occurred_at,
            LoanEvent::LoanReturned(e) => e.occurred_at,
            LoanEvent::LoanDeleted(e) => e.occurred_at,
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            LoanEvent::LoanCheckedOut(e) => e.item_id,
            LoanEvent::LoanReturned(e) => e.item_id,
            LoanEvent::LoanDeleted(e) => e.item_id,
        }
    }

    /// The stock mutation this event requires of the inventory store.
    pub fn stock_effect(&self) -> StockEffect {
        match self {
            LoanEvent::LoanCheckedOut(_) => StockEffect::Reserve,
            LoanEvent::LoanReturned(e) if e.restock => StockEffect::Release,
            LoanEvent::LoanDeleted(e) if e.restock => StockEffect::Release,
            _ => StockEffect::None,
        }
    }
}

impl Aggregate for Loan {
    type Command = LoanCommand;
    type Event = LoanEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LoanEvent::LoanCheckedOut(e) => {
                self.id = e.loan_id;
                self.item_id = Some(e.item_id);
                self.borrower_id = Some(e.borrower_id);
                self.checked_out_on = Some(e.checked_out_on);
                self.due_on = Some(e.due_on);
                self.returned_on = None;
                self.condition_out = Some(e.condition_out);
                self.condition_in = None;
                self.status = LoanStatus::Active;
                self.created = true;
            }
            LoanEvent::LoanReturned(e) => {
                self.returned_on = Some(e.returned_on);
                self.condition_in = Some(e.condition_in);
                self.status = LoanStatus::Returned;
            }
            LoanEvent::LoanDeleted(_) => {
                self.status = LoanStatus::Deleted;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LoanCommand::CheckoutItem(cmd) => self.handle_checkout(cmd),
            LoanCommand::RecordReturn(cmd) => self.handle_return(cmd),
            LoanCommand::DeleteLoan(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Loan {
    fn ensure_created(&self) -> DomainResult<(NaiveDate, ItemId)> {
        if !self.created || matches!(self.status, LoanStatus::Deleted) {
            return Err(DomainError::not_found());
        }
        match (self.checked_out_on, self.item_id) {
            (Some(checked_out_on), Some(item_id)) => Ok((checked_out_on, item_id)),
            _ => Err(DomainError::not_found()),
        }
    }

    fn handle_checkout(&self, cmd: &CheckoutItem) -> DomainResult<Vec<LoanEvent>> {
        if self.created {
            return Err(DomainError::conflict("loan already exists"));
        }

        let due_on = match cmd.due_on {
            Some(due_on) => due_on,
            None => cmd
                .checked_out_on
                .checked_add_days(Days::new(DEFAULT_LOAN_PERIOD_DAYS))
                .ok_or_else(|| {
                    DomainError::invalid_date_range("default due date overflows the calendar")
                })?,
        };

        validate::check_date_order(cmd.checked_out_on, due_on)?;

        Ok(vec![LoanEvent::LoanCheckedOut(LoanCheckedOut {
            loan_id: cmd.loan_id,
            item_id: cmd.item_id,
            borrower_id: cmd.borrower_id,
            checked_out_on: cmd.checked_out_on,
            due_on,
            condition_out: cmd.condition_out,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_return(&self, cmd: &RecordReturn) -> DomainResult<Vec<LoanEvent>> {
        let (checked_out_on, item_id) = self.ensure_created()?;

        // Reject, not re-process: a second return would double-release stock.
        if self.returned_on.is_some() {
            return Err(DomainError::AlreadyReturned);
        }

        validate::check_return_order(checked_out_on, cmd.returned_on)?;

        Ok(vec![LoanEvent::LoanReturned(LoanReturned {
            loan_id: self.id,
            item_id,
            returned_on: cmd.returned_on,
            condition_in: cmd.condition_in,
            restock: cmd.condition_in.is_restockable(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteLoan) -> DomainResult<Vec<LoanEvent>> {
        let (_, item_id) = self.ensure_created()?;

        Ok(vec![LoanEvent::LoanDeleted(LoanDeleted {
            loan_id: self.id,
            item_id,
            restock: matches!(self.status, LoanStatus::Active),
            occurred_at: cmd.occurred_at,
        })])
    }
}
