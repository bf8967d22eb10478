use serde::Serialize;
use utoipa::ToSchema;

use crate::model::equipment::EquipmentStatus;
use crate::model::rental::RentalStatus;
use crate::model::transition::TransitionError;

/// Facts the guards need that are not on the rental row itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionContext {
    pub item_count: usize,
    /// At least one invoice that is not cancelled.
    pub has_invoice: bool,
    pub fully_paid: bool,
    /// The rental's equipment is currently out on this rental.
    pub holds_equipment: bool,
}

/// What happens to the rented equipment when a rental enters a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentEffect {
    /// Every item's equipment becomes this status.
    SetAll(EquipmentStatus),
    /// Only equipment currently `from` moves to `to`.
    Release {
        from: EquipmentStatus,
        to: EquipmentStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NextStates {
    pub current: RentalStatus,
    pub next_states: Vec<RentalStatus>,
    pub is_final: bool,
}

/// Lifecycle rules for rentals. Implementations are pure; the repository
/// applies the result together with a status log row.
pub trait RentalWorkflow: Send + Sync {
    fn next_states(&self, from: RentalStatus) -> &'static [RentalStatus];

    fn can_transition(&self, from: RentalStatus, to: RentalStatus) -> bool {
        self.next_states(from).contains(&to)
    }

    fn is_final_state(&self, status: RentalStatus) -> bool {
        self.next_states(status).is_empty()
    }

    /// Guard failure reason for entering `to`, if any.
    fn guard(&self, to: RentalStatus, ctx: &TransitionContext) -> Option<&'static str>;

    /// Side effect on the rental's equipment when entering `to`.
    fn equipment_effect(
        &self,
        to: RentalStatus,
        ctx: &TransitionContext,
    ) -> Option<EquipmentEffect>;

    fn check_transition(
        &self,
        from: RentalStatus,
        to: RentalStatus,
        ctx: &TransitionContext,
    ) -> Result<(), TransitionError> {
        if !self.can_transition(from, to) {
            let reason = if self.is_final_state(from) {
                "Rental is in a final state"
            } else {
                "Transition not allowed by the rental workflow"
            };
            return Err(TransitionError::new("rental", from, to, reason));
        }
        match self.guard(to, ctx) {
            Some(reason) => Err(TransitionError::new("rental", from, to, reason)),
            None => Ok(()),
        }
    }

    fn describe(&self, current: RentalStatus) -> NextStates {
        NextStates {
            current,
            next_states: self.next_states(current).to_vec(),
            is_final: self.is_final_state(current),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRentalWorkflow;

impl RentalWorkflow for StandardRentalWorkflow {
    fn next_states(&self, from: RentalStatus) -> &'static [RentalStatus] {
        use RentalStatus::*;
        match from {
            Pending => &[Quotation, Cancelled],
            Quotation => &[QuotationApproved, Cancelled],
            QuotationApproved => &[Mobilization, Cancelled],
            Mobilization => &[MobilizationCompleted, Active, Cancelled],
            MobilizationCompleted => &[Active, Cancelled],
            Active => &[Overdue, Completed, InvoicePrepared, Cancelled],
            Overdue => &[Active, Completed, InvoicePrepared, Closed],
            Completed => &[InvoicePrepared],
            InvoicePrepared => &[Overdue, Closed],
            Closed | Cancelled => &[],
        }
    }

    fn guard(&self, to: RentalStatus, ctx: &TransitionContext) -> Option<&'static str> {
        match to {
            RentalStatus::Quotation if ctx.item_count == 0 => {
                Some("Cannot generate quotation: rental has no items")
            }
            RentalStatus::Active if ctx.item_count == 0 => Some("Cannot start a rental without items"),
            RentalStatus::InvoicePrepared if ctx.item_count == 0 => {
                Some("Cannot invoice a rental without items")
            }
            RentalStatus::InvoicePrepared if !ctx.has_invoice => {
                Some("Create the rental's invoice before marking it invoice prepared")
            }
            RentalStatus::Closed if !ctx.fully_paid => {
                Some("Rental cannot be closed while invoices are unpaid")
            }
            _ => None,
        }
    }

    fn equipment_effect(
        &self,
        to: RentalStatus,
        ctx: &TransitionContext,
    ) -> Option<EquipmentEffect> {
        match to {
            // Overdue rentals going back to active already hold it.
            RentalStatus::Active if !ctx.holds_equipment => {
                Some(EquipmentEffect::SetAll(EquipmentStatus::Rented))
            }
            // Equipment given back earlier may be out on another rental now.
            RentalStatus::Completed | RentalStatus::Cancelled | RentalStatus::Closed
                if ctx.holds_equipment =>
            {
                Some(EquipmentEffect::Release {
                    from: EquipmentStatus::Rented,
                    to: EquipmentStatus::Available,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;
    use RentalStatus::*;

    const WITH_ITEMS: TransitionContext = TransitionContext {
        item_count: 2,
        has_invoice: false,
        fully_paid: false,
        holds_equipment: false,
    };

    const INVOICED: TransitionContext = TransitionContext {
        item_count: 2,
        has_invoice: true,
        fully_paid: false,
        holds_equipment: false,
    };

    #[test]
    fn happy_path_through_the_lifecycle() {
        let wf = StandardRentalWorkflow;
        let paid = TransitionContext {
            item_count: 2,
            has_invoice: true,
            fully_paid: true,
            holds_equipment: false,
        };
        let path = [
            Pending,
            Quotation,
            QuotationApproved,
            Mobilization,
            MobilizationCompleted,
            Active,
            Completed,
            InvoicePrepared,
            Closed,
        ];
        for pair in path.windows(2) {
            assert!(
                wf.check_transition(pair[0], pair[1], &paid).is_ok(),
                "{} -> {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn final_states_have_no_exits() {
        let wf = StandardRentalWorkflow;
        for status in RentalStatus::iter() {
            assert_eq!(
                wf.is_final_state(status),
                matches!(status, Closed | Cancelled),
                "{status}"
            );
        }
        let err = wf.check_transition(Closed, Active, &WITH_ITEMS).unwrap_err();
        assert!(err.reason.contains("final"));
    }

    #[test]
    fn skipping_steps_is_rejected() {
        let wf = StandardRentalWorkflow;
        assert!(wf.check_transition(Pending, Active, &WITH_ITEMS).is_err());
        assert!(wf.check_transition(Quotation, Mobilization, &WITH_ITEMS).is_err());
        assert!(wf.check_transition(Completed, Active, &WITH_ITEMS).is_err());
    }

    #[test]
    fn guards_need_items_and_payment() {
        let wf = StandardRentalWorkflow;
        let empty = TransitionContext::default();
        assert!(wf.check_transition(Pending, Quotation, &empty).is_err());
        assert!(wf.check_transition(MobilizationCompleted, Active, &empty).is_err());
        assert!(wf.check_transition(Pending, Cancelled, &empty).is_ok());
        assert!(wf.check_transition(InvoicePrepared, Closed, &WITH_ITEMS).is_err());
    }

    #[test]
    fn invoice_prepared_needs_an_invoice() {
        let wf = StandardRentalWorkflow;
        let err = wf.check_transition(Active, InvoicePrepared, &WITH_ITEMS).unwrap_err();
        assert!(err.reason.contains("invoice"));
        assert!(wf.check_transition(Overdue, InvoicePrepared, &WITH_ITEMS).is_err());
        assert!(wf.check_transition(Active, InvoicePrepared, &INVOICED).is_ok());
        assert!(wf.check_transition(Completed, InvoicePrepared, &INVOICED).is_ok());
    }

    #[test]
    fn rental_invoiced_while_active_releases_equipment_on_close() {
        let wf = StandardRentalWorkflow;
        let out = TransitionContext {
            holds_equipment: true,
            ..INVOICED
        };
        let paid = TransitionContext {
            fully_paid: true,
            ..out
        };
        // active -> invoice_prepared -> closed never passes through completed
        assert!(wf.check_transition(Active, InvoicePrepared, &out).is_ok());
        assert_eq!(wf.equipment_effect(InvoicePrepared, &out), None);
        assert!(wf.check_transition(InvoicePrepared, Closed, &paid).is_ok());
        assert!(wf.is_final_state(Closed));
        assert_eq!(
            wf.equipment_effect(Closed, &paid),
            Some(EquipmentEffect::Release {
                from: EquipmentStatus::Rented,
                to: EquipmentStatus::Available,
            })
        );
    }

    #[test]
    fn returned_equipment_is_left_alone() {
        let wf = StandardRentalWorkflow;
        // completed earlier, so the equipment may be out on another rental
        let returned = TransitionContext {
            fully_paid: true,
            ..INVOICED
        };
        assert_eq!(wf.equipment_effect(Closed, &returned), None);
        assert_eq!(wf.equipment_effect(Cancelled, &WITH_ITEMS), None);
        assert_eq!(wf.equipment_effect(Completed, &returned), None);
    }

    #[test]
    fn equipment_effects() {
        let wf = StandardRentalWorkflow;
        let out = TransitionContext {
            holds_equipment: true,
            ..WITH_ITEMS
        };
        assert_eq!(
            wf.equipment_effect(Active, &WITH_ITEMS),
            Some(EquipmentEffect::SetAll(EquipmentStatus::Rented))
        );
        assert_eq!(wf.equipment_effect(Active, &out), None);
        assert!(matches!(
            wf.equipment_effect(Cancelled, &out),
            Some(EquipmentEffect::Release { .. })
        ));
        assert!(matches!(
            wf.equipment_effect(Completed, &out),
            Some(EquipmentEffect::Release { .. })
        ));
        assert_eq!(wf.equipment_effect(Quotation, &WITH_ITEMS), None);
    }

    #[test]
    fn describe_lists_next_states() {
        let d = StandardRentalWorkflow.describe(Mobilization);
        assert_eq!(d.next_states, vec![MobilizationCompleted, Active, Cancelled]);
        assert!(!d.is_final);
    }
}
