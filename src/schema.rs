table! {
    installments (id) {
        id -> Uuid,
        loan_id -> Uuid,
        week_number -> Int4,
        due_date -> Date,
        amount -> Numeric,
        paid -> Bool,
    }
}

table! {
    loans (id) {
        id -> Uuid,
        principal -> Numeric,
        interest_rate -> Numeric,
        term_weeks -> Int4,
        weekly_amount -> Numeric,
        start_date -> Date,
        is_active -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    payment_installments (payment_id, installment_id) {
        payment_id -> Uuid,
        installment_id -> Uuid,
    }
}

table! {
    payments (id) {
        id -> Uuid,
        loan_id -> Uuid,
        amount -> Numeric,
        payment_date -> Timestamptz,
        idempotency_key -> Nullable<Varchar>,
    }
}

joinable!(installments -> loans (loan_id));
joinable!(payments -> loans (loan_id));
joinable!(payment_installments -> payments (payment_id));
joinable!(payment_installments -> installments (installment_id));

allow_tables_to_appear_in_same_query!(
    installments,
    loans,
    payment_installments,
    payments,
);
