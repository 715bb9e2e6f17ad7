//! Relay event dispatch
//!
//! One handler per inbound event, registered statically in a single match.
//! Each handler validates its required fields, mutates presence state where
//! the event calls for it, and republishes an enriched event to the
//! project's broadcast group. A missing required field produces an error
//! frame to the sender alone and nothing else.
//!
//! Routing shorthand: "others" excludes the sender, "group" includes it.

use serde_json::{json, Value};
use tracing::debug;

use super::events::{
    emit, emit_error, has_field, now_iso, passthrough, str_field, timestamp_or_now, Envelope,
};
use super::store::{ConnId, RelayStore};

pub fn dispatch(store: &RelayStore, conn: ConnId, text: &str) {
    let Some(envelope) = Envelope::parse(text) else {
        store.send_to(conn, emit_error("Malformed event"));
        return;
    };
    let data = &envelope.data;

    match envelope.event.as_str() {
        "user:join" => user_join(store, conn, data),
        "user:online" => user_presence(store, conn, data, "online"),
        "user:offline" => user_presence(store, conn, data, "offline"),
        "project:join" => project_join(store, conn, data),
        "project:leave" => project_leave(store, conn, data),

        "agreement:sign" => agreement_sign(store, conn, data),
        "agreement:completed" => agreement_completed(store, conn, data),
        "agreement:view" => agreement_view(store, conn, data),
        "agreement:negotiate" => agreement_negotiate(store, conn, data),
        "agreement:negotiation-response" => agreement_negotiation_response(store, conn, data),
        "agreement:cancel" => agreement_cancel(store, conn, data),

        "message:send" => message_send(store, conn, data),
        "message:typing-start" => typing_start(store, conn, data),
        "message:typing-stop" => typing_stop(store, conn, data),
        "message:read" => message_read(store, conn, data),
        "message:delete" => message_delete(store, conn, data),
        "message:edit" => message_edit(store, conn, data),
        "message:file-upload" => message_file_upload(store, conn, data),
        "messages:mark-all-read" => messages_mark_all_read(store, conn, data),

        "project:status-change" => project_status_change(store, conn, data),
        "project:payment-secured" => project_payment_secured(store, conn, data),
        "project:stage-update" => project_stage_update(store, conn, data),
        "project:payment-released" => project_payment_released(store, conn, data),
        "project:complete" => project_complete(store, conn, data),
        "project:rating-submitted" => project_rating_submitted(store, conn, data),
        "project:dispute" => project_dispute(store, conn, data),
        "project:cancel" => project_cancel(store, conn, data),
        "project:deadline-reminder" => project_deadline_reminder(store, data),
        "project:notification" => project_notification(store, data),

        other => debug!(event = other, "ignoring unknown relay event"),
    }
}

/// Broadcast one "stopped typing" notice per project a disconnected user
/// was still marked typing in
pub fn broadcast_disconnect_cleanup(store: &RelayStore, user_id: &str, typing_projects: &[String]) {
    for project_id in typing_projects {
        store.broadcast(
            project_id,
            &emit(
                "user:stopped-typing",
                json!({ "projectId": project_id, "userId": user_id }),
            ),
            None,
        );
    }
}

fn user_join(store: &RelayStore, conn: ConnId, data: &Value) {
    // the client may send a bare user id or an object
    let user_id = data
        .as_str()
        .map(str::to_string)
        .or_else(|| str_field(data, "userId"));
    let Some(user_id) = user_id else {
        store.send_to(conn, emit_error("User ID is required"));
        return;
    };

    store.identify(conn, &user_id);
    store.send_to(
        conn,
        emit(
            "user:connected",
            json!({ "userId": user_id, "socketId": conn }),
        ),
    );
}

fn user_presence(store: &RelayStore, conn: ConnId, data: &Value, status: &str) {
    let Some(user_id) = str_field(data, "userId") else {
        return;
    };
    let project_ids = data
        .get("projectIds")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for project_id in project_ids.iter().filter_map(Value::as_str) {
        store.broadcast(
            project_id,
            &emit(
                "user:status",
                json!({
                    "userId": user_id,
                    "status": status,
                    "timestamp": now_iso(),
                }),
            ),
            Some(conn),
        );
    }
}

fn project_join(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        store.send_to(conn, emit_error("Project ID and User ID are required"));
        return;
    };

    store.join_group(&project_id, conn);
    debug!(project_id, user_id, "user joined project group");

    store.broadcast(
        &project_id,
        &emit(
            "user:joined-project",
            json!({
                "projectId": project_id,
                "userId": user_id,
                "timestamp": now_iso(),
            }),
        ),
        Some(conn),
    );
    store.send_to(conn, emit("project:joined", json!({ "projectId": project_id })));
}

fn project_leave(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        return;
    };

    store.leave_group(&project_id, conn);

    store.broadcast(
        &project_id,
        &emit(
            "user:left-project",
            json!({
                "projectId": project_id,
                "userId": user_id,
                "timestamp": now_iso(),
            }),
        ),
        Some(conn),
    );
}

fn agreement_sign(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id), Some(user_type)) = (
        str_field(data, "projectId"),
        str_field(data, "userId"),
        str_field(data, "userType"),
    ) else {
        store.send_to(
            conn,
            emit_error("Project ID, User ID, and User Type are required for signing"),
        );
        return;
    };
    let user_name = str_field(data, "userName").unwrap_or_default();
    let timestamp = timestamp_or_now(data);

    store.broadcast(
        &project_id,
        &emit(
            "agreement:signed",
            json!({
                "projectId": project_id,
                "signedBy": {
                    "userId": user_id,
                    "userType": user_type,
                    "userName": user_name,
                },
                "timestamp": timestamp,
                "message": format!("{} has signed the agreement", user_name),
            }),
        ),
        Some(conn),
    );
    store.send_to(
        conn,
        emit(
            "agreement:sign-confirmed",
            json!({
                "projectId": project_id,
                "userId": user_id,
                "userType": user_type,
                "timestamp": timestamp,
            }),
        ),
    );
}

fn agreement_completed(store: &RelayStore, conn: ConnId, data: &Value) {
    let Some(project_id) = str_field(data, "projectId") else {
        store.send_to(conn, emit_error("Project ID is required"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "agreement:complete",
            json!({
                "projectId": project_id,
                "agreement": passthrough(data, "agreement"),
                "timestamp": now_iso(),
                "message": "Agreement has been signed by both parties",
                "status": "completed",
            }),
        ),
        None,
    );
}

fn agreement_view(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "agreement:viewing",
            json!({
                "projectId": project_id,
                "viewer": {
                    "userId": user_id,
                    "userName": passthrough(data, "userName"),
                },
                "timestamp": now_iso(),
            }),
        ),
        Some(conn),
    );
}

fn agreement_negotiate(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        store.send_to(conn, emit_error("Project ID and User ID are required"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "agreement:negotiation-request",
            json!({
                "projectId": project_id,
                "requestedBy": {
                    "userId": user_id,
                    "userName": passthrough(data, "userName"),
                },
                "changes": passthrough(data, "changes"),
                "message": passthrough(data, "message"),
                "timestamp": now_iso(),
            }),
        ),
        Some(conn),
    );
    store.send_to(
        conn,
        emit(
            "agreement:negotiation-sent",
            json!({ "projectId": project_id, "timestamp": now_iso() }),
        ),
    );
}

fn agreement_negotiation_response(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id), Some(response)) = (
        str_field(data, "projectId"),
        str_field(data, "userId"),
        str_field(data, "response"),
    ) else {
        store.send_to(conn, emit_error("Invalid negotiation response data"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "agreement:negotiation-responded",
            json!({
                "projectId": project_id,
                "respondedBy": {
                    "userId": user_id,
                    "userName": passthrough(data, "userName"),
                },
                "response": response,
                "message": passthrough(data, "message"),
                "timestamp": now_iso(),
            }),
        ),
        None,
    );
}

fn agreement_cancel(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        store.send_to(conn, emit_error("Project ID and User ID are required"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "agreement:cancelled",
            json!({
                "projectId": project_id,
                "cancelledBy": {
                    "userId": user_id,
                    "userName": passthrough(data, "userName"),
                },
                "reason": passthrough(data, "reason"),
                "timestamp": now_iso(),
            }),
        ),
        None,
    );
}

fn message_send(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(sender_id), Some(content)) = (
        str_field(data, "projectId"),
        str_field(data, "senderId"),
        str_field(data, "content"),
    ) else {
        store.send_to(
            conn,
            emit_error("Project ID, Sender ID, and Content are required"),
        );
        return;
    };

    // a send implies the sender stopped typing
    if store.clear_typing(&project_id, &sender_id) {
        store.broadcast(
            &project_id,
            &emit(
                "user:stopped-typing",
                json!({ "projectId": project_id, "userId": sender_id }),
            ),
            None,
        );
    }

    let message_type = str_field(data, "type").unwrap_or_else(|| "text".to_string());
    store.broadcast(
        &project_id,
        &emit(
            "message:new",
            json!({
                "projectId": project_id,
                "message": {
                    "id": passthrough(data, "messageId"),
                    "senderId": sender_id,
                    "senderName": passthrough(data, "senderName"),
                    "senderType": passthrough(data, "senderType"),
                    "content": content,
                    "type": message_type,
                    "fileUrl": passthrough(data, "fileUrl"),
                    "fileName": passthrough(data, "fileName"),
                    "timestamp": timestamp_or_now(data),
                    "status": "sent",
                },
            }),
        ),
        None,
    );
    store.send_to(
        conn,
        emit(
            "message:delivered",
            json!({
                "projectId": project_id,
                "messageId": passthrough(data, "messageId"),
                "timestamp": now_iso(),
            }),
        ),
    );
}

fn typing_start(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        return;
    };

    store.set_typing(&project_id, &user_id);
    store.broadcast(
        &project_id,
        &emit(
            "user:typing",
            json!({
                "projectId": project_id,
                "userId": user_id,
                "userName": passthrough(data, "userName"),
            }),
        ),
        Some(conn),
    );
}

fn typing_stop(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        return;
    };

    store.clear_typing(&project_id, &user_id);
    store.broadcast(
        &project_id,
        &emit(
            "user:stopped-typing",
            json!({ "projectId": project_id, "userId": user_id }),
        ),
        Some(conn),
    );
}

fn message_read(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        return;
    };
    let message_ids = data.get("messageIds").and_then(Value::as_array);
    if message_ids.map(Vec::is_empty).unwrap_or(true) {
        return;
    }

    store.broadcast(
        &project_id,
        &emit(
            "messages:read",
            json!({
                "projectId": project_id,
                "userId": user_id,
                "messageIds": passthrough(data, "messageIds"),
                "timestamp": now_iso(),
            }),
        ),
        Some(conn),
    );
}

fn message_delete(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(message_id), Some(user_id)) = (
        str_field(data, "projectId"),
        str_field(data, "messageId"),
        str_field(data, "userId"),
    ) else {
        store.send_to(conn, emit_error("Invalid delete request"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "message:deleted",
            json!({
                "projectId": project_id,
                "messageId": message_id,
                "deletedBy": user_id,
                "timestamp": now_iso(),
            }),
        ),
        None,
    );
}

fn message_edit(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(message_id), Some(user_id), Some(new_content)) = (
        str_field(data, "projectId"),
        str_field(data, "messageId"),
        str_field(data, "userId"),
        str_field(data, "newContent"),
    ) else {
        store.send_to(conn, emit_error("Invalid edit request"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "message:edited",
            json!({
                "projectId": project_id,
                "messageId": message_id,
                "editedBy": user_id,
                "newContent": new_content,
                "editedAt": now_iso(),
            }),
        ),
        None,
    );
}

fn message_file_upload(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "message:file-uploading",
            json!({
                "projectId": project_id,
                "userId": user_id,
                "userName": passthrough(data, "userName"),
                "fileName": passthrough(data, "fileName"),
                "fileSize": passthrough(data, "fileSize"),
                "fileType": passthrough(data, "fileType"),
                "timestamp": now_iso(),
            }),
        ),
        Some(conn),
    );
}

fn messages_mark_all_read(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(user_id)) =
        (str_field(data, "projectId"), str_field(data, "userId"))
    else {
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "messages:all-read",
            json!({
                "projectId": project_id,
                "userId": user_id,
                "timestamp": now_iso(),
            }),
        ),
        Some(conn),
    );
}

fn project_status_change(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(new_status)) =
        (str_field(data, "projectId"), str_field(data, "newStatus"))
    else {
        store.send_to(conn, emit_error("Project ID and new status are required"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "project:status-updated",
            json!({
                "projectId": project_id,
                "oldStatus": passthrough(data, "oldStatus"),
                "newStatus": new_status,
                "changedBy": passthrough(data, "changedBy"),
                "reason": passthrough(data, "reason"),
                "timestamp": now_iso(),
            }),
        ),
        None,
    );
}

fn project_payment_secured(store: &RelayStore, conn: ConnId, data: &Value) {
    let Some(project_id) = str_field(data, "projectId") else {
        store.send_to(conn, emit_error("Project ID and amount are required"));
        return;
    };
    if !has_field(data, "amount") {
        store.send_to(conn, emit_error("Project ID and amount are required"));
        return;
    }

    store.broadcast(
        &project_id,
        &emit(
            "project:payment-confirmed",
            json!({
                "projectId": project_id,
                "payment": {
                    "amount": passthrough(data, "amount"),
                    "currency": passthrough(data, "currency"),
                    "paymentId": passthrough(data, "paymentId"),
                    "status": "secured",
                },
                "timestamp": now_iso(),
                "message": "Payment has been secured in escrow",
            }),
        ),
        None,
    );
}

fn project_stage_update(store: &RelayStore, conn: ConnId, data: &Value) {
    let valid = str_field(data, "projectId").is_some()
        && has_field(data, "stageNumber")
        && str_field(data, "stageStatus").is_some();
    if !valid {
        store.send_to(conn, emit_error("Invalid stage update data"));
        return;
    }
    let project_id = str_field(data, "projectId").unwrap_or_default();

    store.broadcast(
        &project_id,
        &emit(
            "project:stage-updated",
            json!({
                "projectId": project_id,
                "stage": {
                    "number": passthrough(data, "stageNumber"),
                    "status": passthrough(data, "stageStatus"),
                    "description": passthrough(data, "description"),
                    "updatedBy": passthrough(data, "updatedBy"),
                },
                "timestamp": now_iso(),
            }),
        ),
        None,
    );
}

fn project_payment_released(store: &RelayStore, conn: ConnId, data: &Value) {
    let valid = str_field(data, "projectId").is_some()
        && has_field(data, "amount")
        && str_field(data, "recipientId").is_some();
    if !valid {
        store.send_to(conn, emit_error("Invalid payment release data"));
        return;
    }
    let project_id = str_field(data, "projectId").unwrap_or_default();

    store.broadcast(
        &project_id,
        &emit(
            "project:payment-released-notification",
            json!({
                "projectId": project_id,
                "payment": {
                    "amount": passthrough(data, "amount"),
                    "currency": passthrough(data, "currency"),
                    "recipientId": passthrough(data, "recipientId"),
                    "status": "released",
                },
                "timestamp": now_iso(),
                "message": "Payment has been released from escrow",
            }),
        ),
        None,
    );
}

fn project_complete(store: &RelayStore, conn: ConnId, data: &Value) {
    let Some(project_id) = str_field(data, "projectId") else {
        store.send_to(conn, emit_error("Project ID is required"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "project:completed",
            json!({
                "projectId": project_id,
                "completedBy": passthrough(data, "completedBy"),
                "timestamp": now_iso(),
                "message": "Project has been marked as completed",
            }),
        ),
        None,
    );
}

fn project_rating_submitted(store: &RelayStore, conn: ConnId, data: &Value) {
    let valid = str_field(data, "projectId").is_some()
        && str_field(data, "raterId").is_some()
        && has_field(data, "rating");
    if !valid {
        store.send_to(conn, emit_error("Invalid rating data"));
        return;
    }
    let project_id = str_field(data, "projectId").unwrap_or_default();

    store.broadcast(
        &project_id,
        &emit(
            "project:rating-received",
            json!({
                "projectId": project_id,
                "rating": {
                    "raterId": passthrough(data, "raterId"),
                    "raterType": passthrough(data, "raterType"),
                    "rating": passthrough(data, "rating"),
                    "review": passthrough(data, "review"),
                },
                "timestamp": now_iso(),
            }),
        ),
        None,
    );
}

fn project_dispute(store: &RelayStore, conn: ConnId, data: &Value) {
    let valid = str_field(data, "projectId").is_some()
        && str_field(data, "raisedBy").is_some()
        && str_field(data, "reason").is_some();
    if !valid {
        store.send_to(conn, emit_error("Invalid dispute data"));
        return;
    }
    let project_id = str_field(data, "projectId").unwrap_or_default();

    store.broadcast(
        &project_id,
        &emit(
            "project:dispute-raised",
            json!({
                "projectId": project_id,
                "dispute": {
                    "raisedBy": passthrough(data, "raisedBy"),
                    "reason": passthrough(data, "reason"),
                    "description": passthrough(data, "description"),
                    "status": "pending",
                },
                "timestamp": now_iso(),
                "message": "A dispute has been raised for this project",
            }),
        ),
        None,
    );
}

fn project_cancel(store: &RelayStore, conn: ConnId, data: &Value) {
    let (Some(project_id), Some(cancelled_by)) =
        (str_field(data, "projectId"), str_field(data, "cancelledBy"))
    else {
        store.send_to(conn, emit_error("Project ID and canceller are required"));
        return;
    };

    store.broadcast(
        &project_id,
        &emit(
            "project:cancelled",
            json!({
                "projectId": project_id,
                "cancelledBy": cancelled_by,
                "reason": passthrough(data, "reason"),
                "timestamp": now_iso(),
                "message": "Project has been cancelled",
            }),
        ),
        None,
    );
}

fn project_deadline_reminder(store: &RelayStore, data: &Value) {
    let (Some(project_id), Some(deadline)) =
        (str_field(data, "projectId"), str_field(data, "deadline"))
    else {
        return;
    };
    let hours_remaining = passthrough(data, "hoursRemaining");

    store.broadcast(
        &project_id,
        &emit(
            "project:deadline-alert",
            json!({
                "projectId": project_id,
                "deadline": deadline,
                "hoursRemaining": hours_remaining,
                "timestamp": now_iso(),
                "message": format!("Deadline approaching: {} hours remaining", hours_remaining),
            }),
        ),
        None,
    );
}

fn project_notification(store: &RelayStore, data: &Value) {
    let valid = str_field(data, "projectId").is_some()
        && str_field(data, "type").is_some()
        && str_field(data, "message").is_some();
    if !valid {
        return;
    }
    let project_id = str_field(data, "projectId").unwrap_or_default();

    store.broadcast(
        &project_id,
        &emit(
            "project:notify",
            json!({
                "projectId": project_id,
                "notification": {
                    "type": passthrough(data, "type"),
                    "title": passthrough(data, "title"),
                    "message": passthrough(data, "message"),
                    "data": passthrough(data, "data"),
                },
                "timestamp": now_iso(),
            }),
        ),
        None,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio_tungstenite::tungstenite::Message;

    fn connect(store: &RelayStore) -> (ConnId, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = store.register(tx).unwrap();
        (conn, rx)
    }

    fn recv(rx: &mut UnboundedReceiver<Message>) -> Value {
        match rx.try_recv().expect("expected a frame") {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    fn assert_empty(rx: &mut UnboundedReceiver<Message>) {
        assert!(rx.try_recv().is_err(), "expected no more frames");
    }

    fn joined_trio(store: &RelayStore) -> (
        (ConnId, UnboundedReceiver<Message>),
        (ConnId, UnboundedReceiver<Message>),
        (ConnId, UnboundedReceiver<Message>),
    ) {
        let (a, mut rx_a) = connect(store);
        let (b, mut rx_b) = connect(store);
        let (c, mut rx_c) = connect(store);
        for (conn, user) in [(a, "ua"), (b, "ub"), (c, "uc")] {
            dispatch(
                store,
                conn,
                &json!({ "event": "user:join", "data": { "userId": user } }).to_string(),
            );
            dispatch(
                store,
                conn,
                &json!({ "event": "project:join", "data": { "projectId": "p1", "userId": user } })
                    .to_string(),
            );
        }
        // drain join chatter
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}
        while rx_c.try_recv().is_ok() {}
        ((a, rx_a), (b, rx_b), (c, rx_c))
    }

    #[test]
    fn test_join_acks_sender_and_notifies_group() {
        let store = RelayStore::new(8);
        let (a, mut rx_a) = connect(&store);
        let (b, mut rx_b) = connect(&store);

        dispatch(
            &store,
            a,
            &json!({ "event": "project:join", "data": { "projectId": "p1", "userId": "ua" } })
                .to_string(),
        );
        let ack = recv(&mut rx_a);
        assert_eq!(ack["event"], "project:joined");
        assert_eq!(ack["data"]["projectId"], "p1");
        assert_empty(&mut rx_b);

        dispatch(
            &store,
            b,
            &json!({ "event": "project:join", "data": { "projectId": "p1", "userId": "ub" } })
                .to_string(),
        );
        let notify = recv(&mut rx_a);
        assert_eq!(notify["event"], "user:joined-project");
        assert_eq!(notify["data"]["userId"], "ub");
        assert_eq!(recv(&mut rx_b)["event"], "project:joined");
    }

    #[test]
    fn test_missing_field_errors_only_the_sender() {
        let store = RelayStore::new(8);
        let ((a, mut rx_a), (_b, mut rx_b), (_c, mut rx_c)) = joined_trio(&store);

        dispatch(
            &store,
            a,
            &json!({ "event": "message:send", "data": { "projectId": "p1", "senderId": "ua" } })
                .to_string(),
        );

        let error = recv(&mut rx_a);
        assert_eq!(error["event"], "error");
        assert_eq!(
            error["data"]["message"],
            "Project ID, Sender ID, and Content are required"
        );
        assert_empty(&mut rx_a);
        assert_empty(&mut rx_b);
        assert_empty(&mut rx_c);
    }

    #[test]
    fn test_message_send_fans_out_with_delivery_ack() {
        let store = RelayStore::new(8);
        let ((a, mut rx_a), (_b, mut rx_b), (_c, mut rx_c)) = joined_trio(&store);

        dispatch(
            &store,
            a,
            &json!({ "event": "message:send", "data": {
                "projectId": "p1",
                "messageId": "m1",
                "senderId": "ua",
                "senderName": "Alice",
                "content": "hello",
            }})
            .to_string(),
        );

        for rx in [&mut rx_b, &mut rx_c] {
            let frame = recv(rx);
            assert_eq!(frame["event"], "message:new");
            let message = &frame["data"]["message"];
            assert_eq!(message["id"], "m1");
            assert_eq!(message["senderId"], "ua");
            assert_eq!(message["senderName"], "Alice");
            assert_eq!(message["content"], "hello");
            assert_eq!(message["type"], "text");
            assert_eq!(message["status"], "sent");
            assert!(message["timestamp"].as_str().unwrap().ends_with('Z'));
            assert_empty(rx);
        }

        // sender gets the broadcast once plus a delivery ack, nothing more
        assert_eq!(recv(&mut rx_a)["event"], "message:new");
        let ack = recv(&mut rx_a);
        assert_eq!(ack["event"], "message:delivered");
        assert_eq!(ack["data"]["messageId"], "m1");
        assert_empty(&mut rx_a);
    }

    #[test]
    fn test_message_send_clears_typing_first() {
        let store = RelayStore::new(8);
        let ((a, mut rx_a), (_b, mut rx_b), _c) = joined_trio(&store);

        dispatch(
            &store,
            a,
            &json!({ "event": "message:typing-start", "data": { "projectId": "p1", "userId": "ua" } })
                .to_string(),
        );
        assert_eq!(recv(&mut rx_b)["event"], "user:typing");

        dispatch(
            &store,
            a,
            &json!({ "event": "message:send", "data": {
                "projectId": "p1", "senderId": "ua", "content": "done typing",
            }})
            .to_string(),
        );

        // stopped-typing precedes the message for every group member
        assert_eq!(recv(&mut rx_b)["event"], "user:stopped-typing");
        assert_eq!(recv(&mut rx_b)["event"], "message:new");
        assert_eq!(recv(&mut rx_a)["event"], "user:stopped-typing");
        assert_eq!(recv(&mut rx_a)["event"], "message:new");
    }

    #[test]
    fn test_typing_events_exclude_sender() {
        let store = RelayStore::new(8);
        let ((a, mut rx_a), (_b, mut rx_b), _c) = joined_trio(&store);

        dispatch(
            &store,
            a,
            &json!({ "event": "message:typing-start", "data": {
                "projectId": "p1", "userId": "ua", "userName": "Alice",
            }})
            .to_string(),
        );

        let frame = recv(&mut rx_b);
        assert_eq!(frame["event"], "user:typing");
        assert_eq!(frame["data"]["userName"], "Alice");
        assert_empty(&mut rx_a);
    }

    #[test]
    fn test_disconnect_broadcasts_one_stopped_typing_per_group() {
        let store = RelayStore::new(8);
        let ((a, _rx_a), (_b, mut rx_b), _c) = joined_trio(&store);

        dispatch(
            &store,
            a,
            &json!({ "event": "message:typing-start", "data": { "projectId": "p1", "userId": "ua" } })
                .to_string(),
        );
        assert_eq!(recv(&mut rx_b)["event"], "user:typing");

        let cleanup = store.disconnect(a);
        broadcast_disconnect_cleanup(&store, cleanup.user_id.as_deref().unwrap(), &cleanup.typing_projects);

        let frame = recv(&mut rx_b);
        assert_eq!(frame["event"], "user:stopped-typing");
        assert_eq!(frame["data"]["userId"], "ua");
        assert_empty(&mut rx_b);
    }

    #[test]
    fn test_agreement_sign_routes_ack_and_notify() {
        let store = RelayStore::new(8);
        let ((a, mut rx_a), (_b, mut rx_b), _c) = joined_trio(&store);

        dispatch(
            &store,
            a,
            &json!({ "event": "agreement:sign", "data": {
                "projectId": "p1", "userId": "ua", "userType": "client", "userName": "Alice",
            }})
            .to_string(),
        );

        let signed = recv(&mut rx_b);
        assert_eq!(signed["event"], "agreement:signed");
        assert_eq!(signed["data"]["signedBy"]["userType"], "client");
        assert_eq!(signed["data"]["message"], "Alice has signed the agreement");

        let confirmed = recv(&mut rx_a);
        assert_eq!(confirmed["event"], "agreement:sign-confirmed");
        assert_empty(&mut rx_a);
    }

    #[test]
    fn test_whole_group_events_include_sender() {
        let store = RelayStore::new(8);
        let ((a, mut rx_a), (_b, mut rx_b), _c) = joined_trio(&store);

        dispatch(
            &store,
            a,
            &json!({ "event": "project:status-change", "data": {
                "projectId": "p1", "oldStatus": "pending-payment", "newStatus": "payment-secured",
            }})
            .to_string(),
        );

        for rx in [&mut rx_a, &mut rx_b] {
            let frame = recv(rx);
            assert_eq!(frame["event"], "project:status-updated");
            assert_eq!(frame["data"]["newStatus"], "payment-secured");
        }
    }

    #[test]
    fn test_user_join_with_bare_string_payload() {
        let store = RelayStore::new(8);
        let (a, mut rx_a) = connect(&store);

        dispatch(&store, a, &json!({ "event": "user:join", "data": "ua" }).to_string());

        let frame = recv(&mut rx_a);
        assert_eq!(frame["event"], "user:connected");
        assert_eq!(frame["data"]["userId"], "ua");
        assert!(!frame["data"]["socketId"].is_null());
        assert_eq!(store.user_id_of(a).as_deref(), Some("ua"));
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let store = RelayStore::new(8);
        let (a, mut rx_a) = connect(&store);
        dispatch(&store, a, &json!({ "event": "nope", "data": {} }).to_string());
        assert_empty(&mut rx_a);
    }

    #[test]
    fn test_malformed_frame_errors_sender() {
        let store = RelayStore::new(8);
        let (a, mut rx_a) = connect(&store);
        dispatch(&store, a, "not json");
        assert_eq!(recv(&mut rx_a)["event"], "error");
    }
}
