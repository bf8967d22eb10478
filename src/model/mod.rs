/// Maps a strum text enum onto a MySQL VARCHAR column.
macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::MySql> for $ty {
            fn type_info() -> sqlx::mysql::MySqlTypeInfo {
                <str as sqlx::Type<sqlx::MySql>>::type_info()
            }

            fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
                <str as sqlx::Type<sqlx::MySql>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::MySql> for $ty {
            fn decode(
                value: sqlx::mysql::MySqlValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<sqlx::MySql>>::decode(value)?;
                Ok(raw.parse::<$ty>()?)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::MySql> for $ty {
            fn encode_by_ref(&self, buf: &mut Vec<u8>) -> sqlx::encode::IsNull {
                let raw: &str = self.as_ref();
                <&str as sqlx::Encode<sqlx::MySql>>::encode(raw, buf)
            }
        }
    };
}

pub mod customer;
pub mod depreciation;
pub mod employee;
pub mod equipment;
pub mod invoice;
pub mod leave_request;
pub mod numbering;
pub mod payroll;
pub mod pricing;
pub mod rental;
pub mod rental_workflow;
pub mod role;
pub mod timesheet;
pub mod transition;
pub mod user;
