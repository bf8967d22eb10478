use crate::api::customer::CustomerQuery;
use crate::api::dashboard::ModuleStatus;
use crate::api::employee::EmployeeQuery;
use crate::api::equipment::{
    ChangeEquipmentStatus, DepreciationReport, EquipmentQuery, QuoteRequest, SetDepreciation,
};
use crate::api::invoice::{InvoiceDetail, InvoiceQuery, PaymentReceipt};
use crate::api::leave_approval::{ApprovalQueueQuery, ApproveLeave, BulkApprove, RejectLeave};
use crate::api::leave_report::ReportQuery;
use crate::api::leave_request::{CreateLeave, LeaveBalance, LeaveListQuery};
use crate::api::locale::LocaleList;
use crate::api::payroll::{
    CreatePayroll, GeneratePayroll, GenerationReport, PayPayroll, PayrollDetail, PayrollQuery,
    UpdatePayroll,
};
use crate::api::rental::{
    ActionNotes, OverdueResult, RentalDetail, RentalQuery, StartDateUpdate, TransitionRequest,
};
use crate::api::rental_extension::ExtensionView;
use crate::api::timesheet::{ApproveTimesheet, RejectTimesheet, TimesheetQuery};
use crate::i18n::LocaleValidation;
use crate::model::customer::{Customer, NewCustomer};
use crate::model::depreciation::{
    DepreciationInput, DepreciationMethod, EquipmentDepreciation, ScheduleYear,
};
use crate::model::employee::{Employee, EmployeeStatus, NewEmployee};
use crate::model::equipment::{Equipment, EquipmentStatus, NewEquipment};
use crate::model::invoice::{
    Invoice, InvoiceItem, InvoiceStatus, InvoiceView, Payment, PaymentInput,
};
use crate::model::leave_request::{
    LeaveDraft, LeaveRequest, LeaveStatistics, LeaveStatus, LeaveType,
};
use crate::model::payroll::{
    Payroll, PayrollBreakdown, PayrollItem, PayrollItemType, PayrollStatus,
};
use crate::model::pricing::{
    AdjustmentType, AppliedRule, PriceQuote, PricingCondition, PricingContext, PricingRule,
    PricingRuleInput, RuleType,
};
use crate::model::rental::{
    ExtensionRequest, ExtensionStatus, OverdueCheck, PaymentSummary, RateType, Rental,
    RentalExtension, RentalInput, RentalItem, RentalItemInput, RentalStatus, RentalStatusLog,
};
use crate::model::rental_workflow::NextStates;
use crate::model::timesheet::{
    ApprovalStage, Timesheet, TimesheetInput, TimesheetStatus, TimesheetView,
};
use crate::model::user::UserProfile;
use crate::models::{LinkEmployeeReq, LoginReqDto, RegisterReq, TokenPair};
use crate::repo::dashboard::{DashboardStats, MonthlyRevenue};
use crate::utils::pagination::{
    CustomerPage, EmployeePage, EquipmentPage, InvoicePage, LeavePage, PayrollPage, RentalPage,
    TimesheetPage,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ERP System API",
        version = "1.0.0",
        description = r#"
## Equipment Rental ERP

This API runs the back office of an **equipment rental** business together with its people operations.

### 🔹 Key Features
- **Core**
  - Authentication, dashboard statistics, module status
- **HR**
  - Employees, leave requests with approval, payroll generation
- **Rentals**
  - Customers, rentals through their full lifecycle, extensions
- **Equipment**
  - Fleet status, depreciation schedules, pricing rules and quotes
- **Billing**
  - Invoices created from rentals, payments, rental settlement
- **Timesheets**
  - Daily hours with a four stage approval chain
- **Localization**
  - JSON translation bundles for the web client

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Roles: **Admin**, **HR**, **Manager**, **Employee**, **System** and **API user**.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::auth::handlers::link_employee,

        crate::api::dashboard::dashboard_stats,
        crate::api::dashboard::modules_status,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::update_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::leave_balance,
        crate::api::leave_approval::approve_leave,
        crate::api::leave_approval::reject_leave,
        crate::api::leave_approval::bulk_approve,
        crate::api::leave_approval::approval_queue,
        crate::api::leave_approval::leave_statistics,
        crate::api::leave_report::export_report,

        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::generate_payroll,
        crate::api::payroll::approve_payroll,
        crate::api::payroll::pay_payroll,
        crate::api::payroll::cancel_payroll,

        crate::api::customer::create_customer,
        crate::api::customer::list_customers,
        crate::api::customer::get_customer,
        crate::api::customer::update_customer,
        crate::api::customer::deactivate_customer,

        crate::api::equipment::create_equipment,
        crate::api::equipment::list_equipment,
        crate::api::equipment::get_equipment,
        crate::api::equipment::update_equipment,
        crate::api::equipment::delete_equipment,
        crate::api::equipment::change_equipment_status,
        crate::api::equipment::get_depreciation,
        crate::api::equipment::set_depreciation,
        crate::api::equipment::list_pricing_rules,
        crate::api::equipment::create_pricing_rule,
        crate::api::equipment::update_pricing_rule,
        crate::api::equipment::delete_pricing_rule,
        crate::api::equipment::quote_price,

        crate::api::rental::create_rental,
        crate::api::rental::list_rentals,
        crate::api::rental::get_rental,
        crate::api::rental::update_rental,
        crate::api::rental::delete_rental,
        crate::api::rental::add_item,
        crate::api::rental::remove_item,
        crate::api::rental::transition_rental,
        crate::api::rental::rental_action,
        crate::api::rental::check_overdue,
        crate::api::rental::next_states,
        crate::api::rental::rental_history,
        crate::api::rental::update_start_date,
        crate::api::rental::payment_summary,
        crate::api::rental_extension::request_extension,
        crate::api::rental_extension::list_extensions,
        crate::api::rental_extension::approve_extension,
        crate::api::rental_extension::reject_extension,

        crate::api::invoice::create_from_rental,
        crate::api::invoice::list_invoices,
        crate::api::invoice::get_invoice,
        crate::api::invoice::send_invoice,
        crate::api::invoice::cancel_invoice,
        crate::api::invoice::record_payment,
        crate::api::invoice::list_payments,

        crate::api::timesheet::create_timesheet,
        crate::api::timesheet::get_timesheet,
        crate::api::timesheet::list_timesheets,
        crate::api::timesheet::update_timesheet,
        crate::api::timesheet::delete_timesheet,
        crate::api::timesheet::submit_timesheet,
        crate::api::timesheet::approve_timesheet,
        crate::api::timesheet::reject_timesheet,

        crate::api::locale::list_locales,
        crate::api::locale::get_locale,
        crate::api::locale::missing_keys,
        crate::api::locale::validate_locale,
        crate::api::locale::get_namespace,
        crate::api::locale::put_namespace
    ),
    components(
        schemas(
            RegisterReq,
            LinkEmployeeReq,
            LoginReqDto,
            TokenPair,
            UserProfile,
            DashboardStats,
            MonthlyRevenue,
            ModuleStatus,

            Employee,
            EmployeeStatus,
            NewEmployee,
            EmployeeQuery,
            EmployeePage,

            LeaveRequest,
            LeaveType,
            LeaveStatus,
            LeaveDraft,
            LeaveStatistics,
            CreateLeave,
            LeaveListQuery,
            LeaveBalance,
            ApproveLeave,
            RejectLeave,
            BulkApprove,
            ApprovalQueueQuery,
            ReportQuery,
            LeavePage,

            Payroll,
            PayrollStatus,
            PayrollItem,
            PayrollItemType,
            PayrollBreakdown,
            CreatePayroll,
            UpdatePayroll,
            PayrollQuery,
            GeneratePayroll,
            GenerationReport,
            PayPayroll,
            PayrollDetail,
            PayrollPage,

            Customer,
            NewCustomer,
            CustomerQuery,
            CustomerPage,

            Equipment,
            EquipmentStatus,
            NewEquipment,
            EquipmentQuery,
            ChangeEquipmentStatus,
            EquipmentPage,
            EquipmentDepreciation,
            DepreciationMethod,
            DepreciationInput,
            ScheduleYear,
            SetDepreciation,
            DepreciationReport,
            PricingRule,
            PricingRuleInput,
            PricingCondition,
            RuleType,
            AdjustmentType,
            PricingContext,
            AppliedRule,
            PriceQuote,
            QuoteRequest,

            Rental,
            RentalStatus,
            RateType,
            RentalInput,
            RentalItem,
            RentalItemInput,
            RentalStatusLog,
            RentalQuery,
            RentalDetail,
            RentalPage,
            TransitionRequest,
            ActionNotes,
            StartDateUpdate,
            OverdueCheck,
            OverdueResult,
            NextStates,
            PaymentSummary,
            RentalExtension,
            ExtensionStatus,
            ExtensionRequest,
            ExtensionView,

            Invoice,
            InvoiceStatus,
            InvoiceView,
            InvoiceItem,
            InvoiceQuery,
            InvoiceDetail,
            InvoicePage,
            Payment,
            PaymentInput,
            PaymentReceipt,

            Timesheet,
            TimesheetStatus,
            ApprovalStage,
            TimesheetView,
            TimesheetInput,
            TimesheetQuery,
            ApproveTimesheet,
            RejectTimesheet,
            TimesheetPage,

            LocaleList,
            LocaleValidation
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, registration and tokens"),
        (name = "Dashboard", description = "Statistics and module status"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Customer", description = "Rental customers"),
        (name = "Equipment", description = "Fleet, depreciation and pricing"),
        (name = "Rental", description = "Rental lifecycle and extensions"),
        (name = "Invoice", description = "Invoices and payments"),
        (name = "Timesheet", description = "Timesheets and their approval chain"),
        (name = "Localization", description = "Translation bundles"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_rental_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/rentals/{rental_id}/transition"));
        assert!(doc.paths.paths.contains_key("/api/locales/{locale}/{namespace}"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
