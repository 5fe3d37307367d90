mod common;

use common::TestApp;
use gon_api::error::ServiceError;
use gon_core::dto::{CreatePaymentRequest, CreateReturnRequest, ReturnLineRequest, SaleListFilter, UpdateSaleRequest};
use gon_core::{Money, MovementDirection, PaymentStatus, SaleStatus};

#[tokio::test]
async fn test_sale_with_price_override_computes_totals_and_decrements() {
    let app = TestApp::new().await;
    let w = app.world;

    let view = app
        .state
        .sales()
        .create_sale(&app.sale_request(&[(w.yerba, 3, Some(100))]), &app.salesperson())
        .await
        .unwrap();

    assert_eq!(view.subtotal, Money::from_minor(300));
    assert_eq!(view.tax, Money::from_minor(57));
    assert_eq!(view.total, Money::from_minor(357));
    assert_eq!(view.status, SaleStatus::Completed);
    assert_eq!(view.cashier_user_id, w.salesperson);
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.lines[0].line_subtotal, Money::from_minor(300));

    assert_eq!(app.quantity(w.yerba_stock).await, 7);

    let movements = app.db().stock().movements_for_sale(view.id).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].quantity, 3);
    assert_eq!(movements[0].direction, MovementDirection::Outbound);
    assert_eq!(movements[0].reason, format!("Sale #{}", view.id));
    assert_eq!(movements[0].actor_user_id, Some(w.salesperson));

    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_list_price_used_without_override() {
    let app = TestApp::new().await;
    let w = app.world;

    let view = app
        .state
        .sales()
        .create_sale(
            &app.sale_request(&[(w.yerba, 2, None), (w.mate, 1, Some(0))]),
            &app.salesperson(),
        )
        .await
        .unwrap();

    // 2 × 1000 + 1 × 2500
    assert_eq!(view.subtotal, Money::from_minor(4500));
    assert_eq!(view.tax, Money::from_minor(855));
    assert_eq!(view.total, Money::from_minor(5355));
    let line_sum: Money = view.lines.iter().map(|l| l.line_subtotal).sum();
    assert_eq!(line_sum, view.subtotal);

    assert_eq!(app.quantity(w.yerba_stock).await, 8);
    assert_eq!(app.quantity(w.mate_stock).await, 4);
}

#[tokio::test]
async fn test_insufficient_stock_leaves_stock_untouched() {
    let app = TestApp::new().await;
    let w = app.world;
    let sales = app.state.sales();

    sales
        .create_sale(&app.sale_request(&[(w.yerba, 3, Some(100))]), &app.salesperson())
        .await
        .unwrap();

    let result = sales
        .create_sale(&app.sale_request(&[(w.yerba, 20, None)]), &app.salesperson())
        .await;

    match result {
        Err(ServiceError::InsufficientStock {
            product_id,
            available,
            requested,
        }) => {
            assert_eq!(product_id, w.yerba);
            assert_eq!(available, 7);
            assert_eq!(requested, 20);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    assert_eq!(app.quantity(w.yerba_stock).await, 7);
    let listed = sales.list_sales(&app.global_admin(), &SaleListFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_failing_later_line_persists_nothing() {
    let app = TestApp::new().await;
    let w = app.world;

    let result = app
        .state
        .sales()
        .create_sale(
            &app.sale_request(&[(w.yerba, 2, None), (w.mate, 6, None)]),
            &app.salesperson(),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::InsufficientStock { .. })));

    let result = app
        .state
        .sales()
        .create_sale(
            &app.sale_request(&[(w.yerba, 2, None), (w.bombilla, 1, None)]),
            &app.salesperson(),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidReference(_))));

    assert_eq!(app.quantity(w.yerba_stock).await, 10);
    assert_eq!(app.quantity(w.mate_stock).await, 5);
    assert!(app.db().stock().movements_for_sale(1).await.unwrap().is_empty());
    let listed = app
        .state
        .sales()
        .list_sales(&app.global_admin(), &SaleListFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_repeated_product_checked_against_summed_quantity() {
    let app = TestApp::new().await;
    let w = app.world;

    // 6 + 6 > 10 even though each line alone fits
    let result = app
        .state
        .sales()
        .create_sale(
            &app.sale_request(&[(w.yerba, 6, None), (w.yerba, 6, None)]),
            &app.salesperson(),
        )
        .await;
    match result {
        Err(ServiceError::InsufficientStock { requested, available, .. }) => {
            assert_eq!(requested, 12);
            assert_eq!(available, 10);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    let view = app
        .state
        .sales()
        .create_sale(
            &app.sale_request(&[(w.yerba, 4, None), (w.yerba, 6, None)]),
            &app.salesperson(),
        )
        .await
        .unwrap();
    assert_eq!(view.lines.len(), 2);
    assert_eq!(app.quantity(w.yerba_stock).await, 0);
    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_references_must_belong_to_the_company() {
    let app = TestApp::new().await;
    let w = app.world;
    let sales = app.state.sales();

    let result = sales
        .create_sale(&app.sale_request(&[(w.rival_product, 1, None)]), &app.salesperson())
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidReference(_))));

    let mut request = app.sale_request(&[(w.yerba, 1, None)]);
    request.branch_id = w.rival_branch;
    let result = sales.create_sale(&request, &app.global_admin()).await;
    assert!(matches!(result, Err(ServiceError::InvalidReference(_))));

    let result = sales.create_sale(&app.sale_request(&[(999, 1, None)]), &app.salesperson()).await;
    assert!(matches!(result, Err(ServiceError::InvalidReference(_))));
}

#[tokio::test]
async fn test_request_shape_rejected_before_io() {
    let app = TestApp::new().await;
    let w = app.world;
    let sales = app.state.sales();

    let result = sales.create_sale(&app.sale_request(&[]), &app.salesperson()).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    let result = sales.create_sale(&app.sale_request(&[(w.yerba, 0, None)]), &app.salesperson()).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    let result = sales
        .create_sale(&app.sale_request(&[(w.yerba, 1, Some(-5))]), &app.salesperson())
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_salesperson_cannot_sell_at_another_branch() {
    let app = TestApp::new().await;
    let w = app.world;

    let result = app
        .state
        .sales()
        .create_sale(&app.sale_request(&[(w.yerba, 1, None)]), &app.other_branch_salesperson())
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));

    let result = app
        .state
        .sales()
        .create_sale(&app.sale_request(&[(w.yerba, 1, None)]), &app.rival_admin())
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    assert_eq!(app.quantity(w.yerba_stock).await, 10);
}

#[tokio::test]
async fn test_completed_sale_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let w = app.world;
    let sales = app.state.sales();

    let view = sales
        .create_sale(&app.sale_request(&[(w.yerba, 1, None)]), &app.salesperson())
        .await
        .unwrap();

    let result = sales
        .update_sale(
            view.id,
            &UpdateSaleRequest {
                status: Some(SaleStatus::Cancelled),
                receipt_number: None,
            },
            &app.company_admin(),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidTransition(_))));

    let stored = sales.get_sale(view.id, &app.company_admin()).await.unwrap();
    assert_eq!(stored.status, SaleStatus::Completed);
}

#[tokio::test]
async fn test_update_sets_receipt_number_and_keeps_status() {
    let app = TestApp::new().await;
    let w = app.world;
    let sales = app.state.sales();

    let view = sales
        .create_sale(&app.sale_request(&[(w.yerba, 1, None)]), &app.salesperson())
        .await
        .unwrap();

    sales
        .update_sale(
            view.id,
            &UpdateSaleRequest {
                status: None,
                receipt_number: Some("B-0001".to_string()),
            },
            &app.company_admin(),
        )
        .await
        .unwrap();

    let stored = sales.get_sale(view.id, &app.salesperson()).await.unwrap();
    assert_eq!(stored.receipt_number.as_deref(), Some("B-0001"));
    assert_eq!(stored.status, SaleStatus::Completed);
    assert!(stored.updated_at.is_some());

    let result = sales
        .update_sale(
            view.id,
            &UpdateSaleRequest {
                status: None,
                receipt_number: Some("B-0002".to_string()),
            },
            &app.salesperson(),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));

    let result = sales
        .update_sale(9999, &UpdateSaleRequest::default(), &app.company_admin())
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_restores_stock_with_compensating_movements() {
    let app = TestApp::new().await;
    let w = app.world;
    let sales = app.state.sales();

    let view = sales
        .create_sale(
            &app.sale_request(&[(w.yerba, 3, None), (w.mate, 2, None)]),
            &app.salesperson(),
        )
        .await
        .unwrap();
    assert_eq!(app.quantity(w.yerba_stock).await, 7);

    sales.delete_sale(view.id, &app.company_admin()).await.unwrap();

    assert_eq!(app.quantity(w.yerba_stock).await, 10);
    assert_eq!(app.quantity(w.mate_stock).await, 5);

    let movements = app.db().stock().movements(w.yerba_stock).await.unwrap();
    let last = movements.last().unwrap();
    assert_eq!(last.direction, MovementDirection::Inbound);
    assert_eq!(last.quantity, 3);
    assert_eq!(last.reason, format!("Deletion of sale #{}", view.id));

    let result = sales.get_sale(view.id, &app.company_admin()).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
    app.assert_ledger_consistent().await;
}

#[tokio::test]
async fn test_delete_refused_while_payments_or_returns_exist() {
    let app = TestApp::new().await;
    let w = app.world;
    let sales = app.state.sales();

    let paid = sales
        .create_sale(&app.sale_request(&[(w.yerba, 1, None)]), &app.salesperson())
        .await
        .unwrap();
    app.state
        .payments()
        .create_payment(
            &CreatePaymentRequest {
                sale_id: paid.id,
                payment_method_id: w.cash,
                amount: paid.total,
                reference: None,
                status: PaymentStatus::Completed,
            },
            &app.salesperson(),
        )
        .await
        .unwrap();

    let returned = sales
        .create_sale(&app.sale_request(&[(w.mate, 1, None)]), &app.salesperson())
        .await
        .unwrap();
    app.state
        .returns()
        .create_return(
            &CreateReturnRequest {
                sale_id: returned.id,
                actor_user_id: w.branch_admin,
                reason: None,
                refund_amount: returned.total,
                lines: vec![ReturnLineRequest {
                    product_id: w.mate,
                    quantity: 1,
                    unit_price: Money::from_minor(2500),
                }],
            },
            &app.branch_admin(),
        )
        .await
        .unwrap();

    for id in [paid.id, returned.id] {
        let result = sales.delete_sale(id, &app.company_admin()).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))), "sale {}", id);
        assert!(sales.get_sale(id, &app.company_admin()).await.is_ok());
    }

    let result = sales.delete_sale(paid.id, &app.salesperson()).await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn test_listing_is_scoped_and_filtered() {
    let app = TestApp::new().await;
    let w = app.world;
    let sales = app.state.sales();

    sales
        .create_sale(&app.sale_request(&[(w.yerba, 1, None)]), &app.salesperson())
        .await
        .unwrap();
    let mut north = app.sale_request(&[(w.yerba, 1, None)]);
    north.branch_id = w.other_branch;
    sales.create_sale(&north, &app.other_branch_salesperson()).await.unwrap();

    let all = sales.list_sales(&app.company_admin(), &SaleListFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let mine = sales.list_sales(&app.salesperson(), &SaleListFilter::default()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].branch_id, w.branch);

    // a filter cannot widen the caller's scope
    let widened = sales
        .list_sales(
            &app.salesperson(),
            &SaleListFilter {
                branch_id: Some(w.other_branch),
                ..SaleListFilter::default()
            },
        )
        .await
        .unwrap();
    assert!(widened.is_empty());

    let rival = sales.list_sales(&app.rival_admin(), &SaleListFilter::default()).await.unwrap();
    assert!(rival.is_empty());

    let result = sales.get_sale(mine[0].id, &app.other_branch_salesperson()).await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}
