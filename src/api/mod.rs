pub mod customer;
pub mod dashboard;
pub mod employee;
pub mod equipment;
pub mod invoice;
pub mod leave_approval;
pub mod leave_report;
pub mod leave_request;
pub mod locale;
pub mod payroll;
pub mod rental;
pub mod rental_extension;
pub mod timesheet;
