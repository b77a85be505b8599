use std::fs;

use opgen::descriptor::OperationDescriptor;
use opgen::field::{FieldDescriptor, FieldType};
use opgen::pagination::Page;
use opgen::response::ResponsePlan;
use opgen::{ApiDocument, GenerateError, GeneratorConfig, JsonRenderer, Renderer, compile};
use serde_json::{Map, Value, json};

const SHOP_API: &str = r##"
openapi: 3.0.3
info:
  title: Shop
  version: 3.4.0
servers:
  - url: https://shop.test/api/
paths:
  /orders:
    get:
      operationId: listOrders
      tags: [orders]
      parameters:
        - $ref: '#/components/parameters/Limit'
        - name: offset
          in: query
          schema: { type: integer }
        - name: status
          in: query
          schema: { type: string, enum: [open, closed] }
        - name: X-Trace
          in: header
          schema: { type: string }
      responses:
        200:
          description: ok
          content:
            application/json:
              schema:
                type: object
                properties:
                  has_more: { type: boolean }
                  orders:
                    type: array
                    items: { $ref: '#/components/schemas/Order' }
    post:
      operationId: createOrder
      tags: [orders]
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: '#/components/schemas/NewOrder' }
      responses:
        201:
          description: created
          content:
            application/json:
              schema: { $ref: '#/components/schemas/Order' }
              example:
                id: 41
                customer_id: 7
                api_token: leaked
  /orders/{order_id}:
    delete:
      operationId: deleteOrder
      tags: [orders]
      parameters:
        - name: order_id
          in: path
          schema: { type: integer }
      responses:
        204:
          description: deleted
  /customers:
    get:
      operationId: listCustomers
      tags: [customers]
      responses:
        200:
          description: ok
          content:
            application/json:
              schema:
                type: array
                items: { $ref: '#/components/schemas/Customer' }
  /tags:
    get:
      operationId: listTags
      responses:
        200:
          description: ok
          content:
            application/json:
              schema:
                type: array
                items:
                  type: object
                  properties:
                    tag_id: { type: integer }
                    label: { type: string }
components:
  parameters:
    Limit:
      name: limit
      in: query
      schema: { type: integer, default: 20 }
  schemas:
    Order:
      type: object
      properties:
        id: { type: integer }
        customer_id: { type: integer }
        placed_on: { type: string, format: date }
        parent: { $ref: '#/components/schemas/Order' }
    NewOrder:
      type: object
      required: [lines]
      properties:
        customer_id: { type: integer }
        channel: { type: string, default: web }
        note: { type: string }
        internal_ref: { type: string }
        tag_ids:
          type: array
          items: { type: integer }
        lines:
          type: array
          items: { $ref: '#/components/schemas/Line' }
    Line:
      type: object
      required: [sku]
      properties:
        sku: { type: string }
        quantity: { type: number }
    Customer:
      allOf:
        - type: object
          properties:
            uuid: { type: string, format: uuid }
        - type: object
          properties:
            name: { type: string }
            password: { type: string }
"##;

fn write_config(dir: &std::path::Path, actions: Value, triggers: Value) {
    fs::write(dir.join("actions.json"), actions.to_string()).unwrap();
    fs::write(dir.join("triggers.json"), triggers.to_string()).unwrap();
    fs::write(
        dir.join("authentication.json"),
        json!({ "testEndpoint": "listCustomers", "connectionLabel": "{{name}}" }).to_string(),
    )
    .unwrap();
}

fn shop_config() -> GeneratorConfig {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        json!({
            "createOrder": {
                "hideRequestBodyProperties": ["internal_ref"],
                "simplify": {
                    "flattenArray": true,
                    "arrayField": "lines",
                    "publicName": "Line Item",
                    "additionalProperties": ["customer_id", "channel", "tag_ids"]
                },
                "helperFields": {
                    "extra_tag": { "mapTo": "tag_ids", "label": "Extra Tag" }
                },
                "dynamicFields": {
                    "customer_id": { "trigger": "customer_list", "labelProperty": "name" },
                    "sku": { "trigger": "missing_trigger" }
                },
                "fieldDefaults": { "channel": "email" }
            }
        }),
        json!({
            "new_order": {
                "endpoint": "listOrders",
                "title": "Triggers when an order is placed.",
                "label": "Order #{id}",
                "filters": { "status": "open" }
            },
            "customer_list": {
                "endpoint": "GET /customers",
                "name": "Customer Picker",
                "hidden": true,
                "label": "name"
            }
        }),
    );
    GeneratorConfig::from_dir(dir.path()).unwrap()
}

fn walk_fields<'f>(fields: &'f [FieldDescriptor], out: &mut Vec<&'f FieldDescriptor>) {
    for field in fields {
        out.push(field);
        walk_fields(field.children(), out);
    }
}

#[test]
fn generates_shop_descriptors() {
    let doc = ApiDocument::parse(SHOP_API).unwrap();
    let generation = compile(&doc, &shop_config()).unwrap();

    assert_eq!(generation.version, "3.4.0");
    assert_eq!(generation.base_url, "https://shop.test/api");

    let keys: Vec<&str> = generation.operations.iter().map(|op| op.key()).collect();
    assert_eq!(
        keys,
        [
            "customer_list",
            "new_order",
            "new_tag",
            "list_customers",
            "list_orders",
            "create_order",
            "delete_order",
            "list_tags",
        ]
    );

    let new_order = generation.get("new_order").and_then(OperationDescriptor::as_trigger).unwrap();
    let paging = new_order.pagination.as_ref().unwrap();
    assert_eq!(paging.page_size, 20);
    let field_keys: Vec<&str> = new_order.operation.fields.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(field_keys, ["status"]);
    assert_eq!(new_order.operation.fields[0].choices, ["open", "closed"]);

    let tags = generation.get("new_tag").and_then(OperationDescriptor::as_trigger).unwrap();
    assert_eq!(tags.id_property, "tag_id");
    assert_eq!(tags.operation.sample["id"], tags.operation.sample["tag_id"]);

    let customers = generation.get("customer_list").and_then(OperationDescriptor::as_trigger).unwrap();
    assert!(customers.hidden);
    assert_eq!(customers.id_property, "uuid");
    assert!(!customers.operation.sample.contains_key("password"));

    let create = generation.get("create_order").and_then(OperationDescriptor::as_action).unwrap();
    let top: Vec<&str> = create.operation.fields.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(top, ["line_item", "customer_id", "channel", "tag_ids", "extra_tag"]);
    let group = &create.operation.fields[0];
    assert!(group.required);
    let children: Vec<&str> = group.children().iter().map(|f| f.key.as_str()).collect();
    assert_eq!(children, ["quantity", "sku"]);

    let customer = &create.operation.fields[1];
    let channel = &create.operation.fields[2];
    assert_eq!(channel.default(), Some("email"));
    assert_eq!(customer.dynamic.as_ref().unwrap().trigger, "customer_list");
    assert!(group.children().iter().all(|f| f.dynamic.is_none()));
    assert_eq!(create.operation.fields[4].field_type(), Some(FieldType::Integer));

    assert_eq!(
        Value::Object(create.operation.sample.clone()),
        json!({ "id": 41, "customer_id": 7 })
    );
    assert!(generation.warnings.iter().any(|w| w.contains("missing_trigger")));

    let auth = generation.authentication.as_ref().unwrap();
    assert_eq!(auth.field_key, "api_key");
    assert_eq!(auth.test.as_ref().unwrap().url, "https://shop.test/api/customers");
}

#[test]
fn built_request_flattens_and_merges_helpers() {
    let doc = ApiDocument::parse(SHOP_API).unwrap();
    let generation = compile(&doc, &shop_config()).unwrap();
    let create = generation.get("create_order").unwrap();

    let inputs: Map<String, Value> = json!({
        "line_item": { "sku": "A-1", "quantity": 2 },
        "customer_id": 7,
        "tag_ids": "[4]",
        "extra_tag": "9",
        "internal_ref": "ignored"
    })
    .as_object()
    .cloned()
    .unwrap();

    let request = create.operation().request.build(&inputs, Some("k3y")).unwrap();
    assert_eq!(request.url, "https://shop.test/api/orders");
    assert_eq!(
        request.headers,
        vec![("Authorization".to_string(), "Bearer k3y".to_string())]
    );
    assert_eq!(
        request.body,
        Some(json!({
            "lines": [{ "sku": "A-1", "quantity": 2 }],
            "customer_id": 7,
            "tag_ids": [4, 9]
        }))
    );
}

#[test]
fn trigger_pages_until_exhausted() {
    let doc = ApiDocument::parse(SHOP_API).unwrap();
    let generation = compile(&doc, &shop_config()).unwrap();
    let trigger = generation.get("new_order").and_then(OperationDescriptor::as_trigger).unwrap();
    let paging = trigger.pagination.as_ref().unwrap();

    let base = trigger.operation.request.build(&Map::new(), None).unwrap();
    let mut requested = Vec::new();
    let items = paging
        .paginate(|offset, limit| {
            let request = paging.page_request(&base, offset);
            requested.push(request.query.clone());
            let count = if offset == 0 { limit } else { 3 };
            let orders: Vec<Value> = (0..count)
                .map(|i| json!({ "id": offset + i, "status": if i % 2 == 0 { "open" } else { "closed" } }))
                .collect();
            let body = json!({ "orders": orders, "has_more": offset == 0 });
            Ok::<Page, std::convert::Infallible>(paging.read_page(&trigger.operation.response, body))
        })
        .unwrap();

    assert_eq!(items.len(), 23);
    assert_eq!(requested.len(), 2);
    assert!(requested[1].contains(&("offset".to_string(), "20".to_string())));
    assert!(requested[1].contains(&("limit".to_string(), "20".to_string())));

    let open = trigger.items(Some(json!({ "orders": items })));
    assert_eq!(open.len(), 12);
    assert_eq!(
        trigger.label_plan.as_ref().unwrap().apply(&open[0]).as_deref(),
        Some("Order #0")
    );
}

#[test]
fn structural_invariants_hold_for_every_descriptor() {
    let doc = ApiDocument::parse(SHOP_API).unwrap();
    let generation = compile(&doc, &shop_config()).unwrap();

    for op in &generation.operations {
        let operation = op.operation();
        assert!(!operation.sample.is_empty(), "{} has an empty sample", operation.key);
        if op.as_trigger().is_some() {
            assert!(operation.sample.contains_key("id"), "{} sample lacks id", operation.key);
        }

        let mut fields = Vec::new();
        walk_fields(&operation.fields, &mut fields);
        for field in fields {
            assert!(field.field_type().is_some() != !field.children().is_empty());
            if field.default().is_some() {
                assert_eq!(field.field_type(), Some(FieldType::String));
            }
        }
    }

    let delete = generation.get("delete_order").unwrap();
    assert_eq!(delete.operation().response, ResponsePlan::NoContent);
    assert_eq!(
        Value::Object(delete.operation().sample.clone()),
        json!({ "success": true, "status": 204 })
    );
}

#[test]
fn bad_default_aborts_without_output() {
    let doc = ApiDocument::parse(SHOP_API).unwrap();
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        json!({ "createOrder": { "fieldDefaults": { "priority": "high" } } }),
        json!({}),
    );
    let config = GeneratorConfig::from_dir(dir.path()).unwrap();

    let err = compile(&doc, &config).unwrap_err();
    assert!(matches!(err, GenerateError::UnknownDefaultField { .. }));
    assert!(err.to_string().contains("createOrder"));
    assert!(err.to_string().contains("priority"));
}

#[test]
fn renders_json() {
    let doc = ApiDocument::parse(SHOP_API).unwrap();
    let generation = compile(&doc, &shop_config()).unwrap();
    let text = JsonRenderer::pretty().render(&generation).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();

    let first = &value["operations"][0];
    assert_eq!(first["kind"], json!("trigger"));
    assert_eq!(first["hidden"], json!(true));
    assert_eq!(first["label"], json!("Customer Picker"));
    assert_eq!(
        first["labelPlan"],
        json!({ "kind": "property", "property": "name" })
    );
    assert_eq!(text.matches("\"label\": \"Customer Picker\"").count(), 1);
    assert_eq!(value["authentication"]["plan"]["scheme"], json!("Bearer"));
}
