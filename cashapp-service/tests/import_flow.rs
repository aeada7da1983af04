mod common;

use common::spawn_app;
use serial_test::serial;

const CSV_HEADER: &str = "Id;REF;ORDER;STATUS;LIB;ACCEPT;PAYDATE;CIE;FACNAME1;COUNTRY;TOTAL;CUR;\
METHOD;BRAND;CARD;EXPDATE;UID;ACTION;TICKET;DESC;SHIP;TAX;MERCHREF;REFID;BATCHREF;OWNER;ALIAS;\
FRAUD_TYPE;PAYDATETIME;ORDERDATETIME;SUBBRAND";

fn sample_csv() -> String {
    format!(
        "{CSV_HEADER}\n\
         WL-IT-001;R1;O1;PAID;lib;ACC;15/01/2024;CIE;Merchant One;NL;1.234,56;EUR;CARD;VISA;\
         411111xxxxxx1111;12/26;U1;SALE;T1;desc;0,00;0,00;SHOP-1;RF1;B1;OWN;AL;;\
         15/01/2024 10:30:00;15/01/2024 10:29:00;\n\
         WL-IT-002;R2;O2;PAID;lib;ACC;16/01/2024;CIE;Merchant Two;BE;99,99;EUR;CARD;MASTERCARD;\
         511111xxxxxx1111;11/25;U2;SALE;T2;desc;0,00;0,00;SHOP-2;RF2;B2;OWN;AL;;\
         16/01/2024 09:00:00;16/01/2024 08:59:00;\n"
    )
}

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn csv_upload_imports_payments_and_logs_the_import() {
    let app = spawn_app().await;
    app.login_as_admin().await;

    let part = reqwest::multipart::Part::text(sample_csv())
        .file_name("worldline_test.csv")
        .mime_str("text/csv")
        .expect("invalid mime");
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = app
        .client
        .post(format!("{}/recon/import", app.address))
        .multipart(form)
        .send()
        .await
        .expect("failed to execute upload");
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);

    let response = app
        .client
        .get(format!("{}/recon/import/history", app.address))
        .send()
        .await
        .expect("failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body = response.text().await.expect("failed to read body");
    assert!(body.contains("worldline_test.csv"));
}

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn reimporting_the_same_file_counts_duplicates() {
    let app = spawn_app().await;
    app.login_as_admin().await;

    for _ in 0..2 {
        let part = reqwest::multipart::Part::text(sample_csv())
            .file_name("worldline_dup.csv")
            .mime_str("text/csv")
            .expect("invalid mime");
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = app
            .client
            .post(format!("{}/recon/import", app.address))
            .multipart(form)
            .send()
            .await
            .expect("failed to execute upload");
        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    }

    // The second pass inserts nothing; both rows count as duplicates.
    let response = app
        .client
        .get(format!("{}/recon/import", app.address))
        .send()
        .await
        .expect("failed to execute request");
    let body = response.text().await.expect("failed to read body");
    assert!(body.contains("0 imported, 2 duplicates"));
}

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn non_csv_upload_is_rejected_with_a_flash() {
    let app = spawn_app().await;
    app.login_as_admin().await;

    let part = reqwest::multipart::Part::text("not a csv")
        .file_name("payments.txt")
        .mime_str("text/plain")
        .expect("invalid mime");
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = app
        .client
        .post(format!("{}/recon/import", app.address))
        .multipart(form)
        .send()
        .await
        .expect("failed to execute upload");

    // Rejected uploads flash an error and return to the import page.
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/recon/import");
}
