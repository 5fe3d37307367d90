mod common;

use common::TestApp;
use gon_api::error::ServiceError;
use gon_core::dto::{CreateReturnRequest, ReturnLineRequest, SaleRefFilter, SaleView, UpdateReturnRequest};
use gon_core::{Money, MovementDirection, ReturnStatus};

async fn sell(app: &TestApp, lines: &[(i64, i64, Option<i64>)]) -> SaleView {
    app.state
        .sales()
        .create_sale(&app.sale_request(lines), &app.salesperson())
        .await
        .unwrap()
}

fn return_request(sale: &SaleView, actor: i64, lines: &[(i64, i64)]) -> CreateReturnRequest {
    CreateReturnRequest {
        sale_id: sale.id,
        actor_user_id: actor,
        reason: Some("Producto dañado".to_string()),
        refund_amount: Money::from_minor(100),
        lines: lines
            .iter()
            .map(|&(product_id, quantity)| ReturnLineRequest {
                product_id,
                quantity,
                unit_price: Money::from_minor(100),
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_return_restores_stock_with_inbound_movement() {
    let app = TestApp::new().await;
    let w = app.world;

    let sale = sell(&app, &[(w.yerba, 3, Some(100))]).await;
    assert_eq!(app.quantity(w.yerba_stock).await, 7);

    let mut request = return_request(&sale, w.branch_admin, &[(w.yerba, 3)]);
    request.refund_amount = Money::from_minor(357);
    let view = app
        .state
        .returns()
        .create_return(&request, &app.branch_admin())
        .await
        .unwrap();

    assert_eq!(view.sale_id, sale.id);
    assert_eq!(view.status, ReturnStatus::Pending);
    assert_eq!(view.refund_amount, Money::from_minor(357));
    assert_eq!(view.lines.len(), 1);
    assert_eq!(app.quantity(w.yerba_stock).await, 10);

    let movements = app.db().stock().movements_for_return(view.id).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].direction, MovementDirection::Inbound);
    assert_eq!(movements[0].quantity, 3);
    assert_eq!(movements[0].return_id, Some(view.id));
    assert_eq!(movements[0].reason, format!("Return of sale #{}", sale.id));

    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_over_return_is_accepted() {
    let app = TestApp::new().await;
    let w = app.world;

    let sale = sell(&app, &[(w.yerba, 2, None)]).await;
    app.state
        .returns()
        .create_return(&return_request(&sale, w.branch_admin, &[(w.yerba, 5)]), &app.branch_admin())
        .await
        .unwrap();

    // 10 - 2 + 5
    assert_eq!(app.quantity(w.yerba_stock).await, 13);
    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_return_failures_persist_nothing() {
    let app = TestApp::new().await;
    let w = app.world;
    let sale = sell(&app, &[(w.yerba, 2, None)]).await;
    let returns = app.state.returns();

    // bombilla has no stock record at the branch
    let result = returns
        .create_return(
            &return_request(&sale, w.branch_admin, &[(w.yerba, 1), (w.bombilla, 1)]),
            &app.branch_admin(),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidReference(_))));

    let result = returns
        .create_return(&return_request(&sale, 999, &[(w.yerba, 1)]), &app.branch_admin())
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidReference(_))));

    // actor from another company
    let result = returns
        .create_return(&return_request(&sale, w.rival_admin, &[(w.yerba, 1)]), &app.branch_admin())
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidReference(_))));

    let mut missing = return_request(&sale, w.branch_admin, &[(w.yerba, 1)]);
    missing.sale_id = 9999;
    let result = returns.create_return(&missing, &app.branch_admin()).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));

    let result = returns
        .create_return(&return_request(&sale, w.salesperson, &[(w.yerba, 1)]), &app.salesperson())
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));

    assert_eq!(app.quantity(w.yerba_stock).await, 8);
    assert!(returns.list_returns_for_sale(sale.id, &app.branch_admin()).await.unwrap().is_empty());
    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_partial_update_keeps_absent_fields() {
    let app = TestApp::new().await;
    let w = app.world;
    let sale = sell(&app, &[(w.yerba, 2, None)]).await;
    let returns = app.state.returns();

    let created = returns
        .create_return(&return_request(&sale, w.branch_admin, &[(w.yerba, 1)]), &app.branch_admin())
        .await
        .unwrap();

    let updated = returns
        .update_return(
            created.id,
            &UpdateReturnRequest {
                status: Some(ReturnStatus::Approved),
                ..UpdateReturnRequest::default()
            },
            &app.branch_admin(),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, ReturnStatus::Approved);
    assert_eq!(updated.reason, created.reason);
    assert_eq!(updated.refund_amount, created.refund_amount);
    assert!(updated.updated_at.is_some());

    let updated = returns
        .update_return(
            created.id,
            &UpdateReturnRequest {
                refund_amount: Some(Money::from_minor(50)),
                ..UpdateReturnRequest::default()
            },
            &app.company_admin(),
        )
        .await
        .unwrap();
    assert_eq!(updated.refund_amount, Money::from_minor(50));
    assert_eq!(updated.status, ReturnStatus::Approved);

    // status changes never touch stock
    assert_eq!(app.quantity(w.yerba_stock).await, 9);

    let result = returns
        .update_return(created.id, &UpdateReturnRequest::default(), &app.salesperson())
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));

    let result = returns
        .update_return(9999, &UpdateReturnRequest::default(), &app.branch_admin())
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn test_returns_visible_only_in_scope() {
    let app = TestApp::new().await;
    let w = app.world;
    let sale = sell(&app, &[(w.mate, 1, None)]).await;
    let returns = app.state.returns();

    let created = returns
        .create_return(&return_request(&sale, w.branch_admin, &[(w.mate, 1)]), &app.branch_admin())
        .await
        .unwrap();

    assert_eq!(returns.get_return(created.id, &app.salesperson()).await.unwrap().id, created.id);
    assert_eq!(
        returns.list_returns_for_sale(sale.id, &app.company_admin()).await.unwrap().len(),
        1
    );

    let result = returns.get_return(created.id, &app.other_branch_salesperson()).await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    let result = returns.list_returns_for_sale(sale.id, &app.rival_admin()).await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn test_delete_return_takes_stock_back() {
    let app = TestApp::new().await;
    let w = app.world;
    let sale = sell(&app, &[(w.yerba, 3, None)]).await;
    let returns = app.state.returns();

    let created = returns
        .create_return(&return_request(&sale, w.branch_admin, &[(w.yerba, 2)]), &app.branch_admin())
        .await
        .unwrap();
    assert_eq!(app.quantity(w.yerba_stock).await, 9);

    let result = returns.delete_return(created.id, &app.branch_admin()).await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));

    returns.delete_return(created.id, &app.company_admin()).await.unwrap();
    assert_eq!(app.quantity(w.yerba_stock).await, 7);

    let movements = app.db().stock().movements(w.yerba_stock).await.unwrap();
    // opening balance, sale, return, reversal
    assert_eq!(movements.len(), 4);
    let reversal = &movements[3];
    assert_eq!(reversal.direction, MovementDirection::Outbound);
    assert_eq!(reversal.quantity, 2);
    assert_eq!(reversal.return_id, None);
    assert_eq!(reversal.reason, format!("Deletion of return #{}", created.id));

    let result = returns.get_return(created.id, &app.company_admin()).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
    let result = returns.delete_return(created.id, &app.company_admin()).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
    app.assert_ledger_consistent().await;

    // with the return gone the sale is deletable again
    app.state.sales().delete_sale(sale.id, &app.company_admin()).await.unwrap();
    assert_eq!(app.quantity(w.yerba_stock).await, 10);
    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_delete_return_fails_when_units_were_resold() {
    let app = TestApp::new().await;
    let w = app.world;
    let sale = sell(&app, &[(w.yerba, 10, None)]).await;
    let returns = app.state.returns();

    let created = returns
        .create_return(&return_request(&sale, w.branch_admin, &[(w.yerba, 2)]), &app.branch_admin())
        .await
        .unwrap();
    sell(&app, &[(w.yerba, 2, None)]).await;
    assert_eq!(app.quantity(w.yerba_stock).await, 0);

    let result = returns.delete_return(created.id, &app.company_admin()).await;
    assert!(matches!(
        result,
        Err(ServiceError::InsufficientStock {
            available: 0,
            requested: 2,
            ..
        })
    ));

    assert_eq!(returns.get_return(created.id, &app.company_admin()).await.unwrap().id, created.id);
    assert_eq!(app.quantity(w.yerba_stock).await, 0);
    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_list_returns_is_scoped_and_filtered() {
    let app = TestApp::new().await;
    let w = app.world;
    let first = sell(&app, &[(w.yerba, 2, None)]).await;
    let second = sell(&app, &[(w.mate, 1, None)]).await;
    let returns = app.state.returns();

    returns
        .create_return(&return_request(&first, w.branch_admin, &[(w.yerba, 1)]), &app.branch_admin())
        .await
        .unwrap();
    returns
        .create_return(&return_request(&second, w.branch_admin, &[(w.mate, 1)]), &app.branch_admin())
        .await
        .unwrap();

    let all = returns.list_returns(&app.company_admin(), &SaleRefFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let filter = SaleRefFilter {
        sale_id: Some(second.id),
    };
    let only_second = returns.list_returns(&app.salesperson(), &filter).await.unwrap();
    assert_eq!(only_second.len(), 1);
    assert_eq!(only_second[0].sale_id, second.id);

    assert!(returns
        .list_returns(&app.other_branch_salesperson(), &SaleRefFilter::default())
        .await
        .unwrap()
        .is_empty());
    assert!(returns
        .list_returns(&app.rival_admin(), &SaleRefFilter::default())
        .await
        .unwrap()
        .is_empty());
}
