use serde::Serialize;
use utoipa::ToSchema;

use crate::model::customer::Customer;
use crate::model::employee::Employee;
use crate::model::equipment::Equipment;
use crate::model::invoice::InvoiceView;
use crate::model::leave_request::LeaveRequest;
use crate::model::payroll::Payroll;
use crate::model::rental::Rental;
use crate::model::timesheet::TimesheetView;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

/// Normalized page/per_page taken from a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub per_page: u32,
}

impl PageParams {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> u64 {
        self.per_page as u64
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    EmployeePage = Page<Employee>,
    LeavePage = Page<LeaveRequest>,
    PayrollPage = Page<Payroll>,
    CustomerPage = Page<Customer>,
    EquipmentPage = Page<Equipment>,
    RentalPage = Page<Rental>,
    InvoicePage = Page<InvoiceView>,
    TimesheetPage = Page<TimesheetView>
)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, params: PageParams, total: i64) -> Self {
        Self {
            data,
            page: params.page,
            per_page: params.per_page,
            total,
        }
    }

    pub fn empty(params: PageParams) -> Self {
        Self::new(Vec::new(), params, 0)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_bounds() {
        let p = PageParams::new(None, None);
        assert_eq!((p.page, p.per_page, p.offset()), (1, 10, 0));

        let p = PageParams::new(Some(0), Some(500));
        assert_eq!((p.page, p.per_page), (1, 100));

        let p = PageParams::new(Some(3), Some(20));
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }
}
