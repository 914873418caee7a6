#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use chrono::{Datelike, Months, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tauri::{AppHandle, Manager};
use tauri_plugin_clipboard_manager::ClipboardExt;
use tauri_plugin_opener::OpenerExt;
use uuid::Uuid;

const USERS_FILE: &str = "users.json";
const SETTINGS_FILE: &str = "settings.json";
const TASKS_FILE: &str = "tasks.json";
const NOTES_FILE: &str = "notes.json";
const EMPLOYEES_FILE: &str = "employees.json";
const MONTHLY_EMPLOYEES_FILE: &str = "monthly_employees.json";
const VACATIONS_FILE: &str = "vacations.json";
const RECORD_FILES: [&str; 7] = [
    USERS_FILE,
    SETTINGS_FILE,
    TASKS_FILE,
    NOTES_FILE,
    EMPLOYEES_FILE,
    MONTHLY_EMPLOYEES_FILE,
    VACATIONS_FILE,
];

// A calendar day never holds more than two leave slots.
const DAY_SLOT_CAPACITY: usize = 2;

const PERMISSIONS: [&str; 19] = [
    "view_tools",
    "edit_tools",
    "view_browse",
    "edit_browse",
    "view_admin",
    "send_notifications",
    "manage_users",
    "view_todo",
    "edit_todo",
    "view_date_converter",
    "edit_date_converter",
    "view_time_calculator",
    "edit_time_calculator",
    "view_notepad",
    "edit_notepad",
    "view_monthly_vacations",
    "edit_monthly_vacations",
    "view_monthly_leave",
    "edit_monthly_leave",
];
const USER_ROLES: [&str; 2] = ["admin", "user"];
const USER_STATUSES: [&str; 2] = ["online", "offline"];
const TASK_CATEGORIES: [&str; 4] = [
    "urgent_important",
    "urgent_not_important",
    "not_urgent_important",
    "not_urgent_not_important",
];
const TASK_STATUSES: [&str; 3] = ["todo", "in_progress", "completed"];
const LANGUAGES: [&str; 2] = ["en", "ar"];
const THEMES: [&str; 3] = ["light", "dark", "custom"];

struct LeaveRecords {
    roster: Vec<serde_json::Value>,
    monthly: serde_json::Map<String, serde_json::Value>,
    vacations: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct SaveCsvResult {
    ok: bool,
    canceled: bool,
    filename: String,
    path: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct StorageInfoResult {
    ok: bool,
    path_label: String,
}

#[derive(Deserialize)]
struct ClipboardWriteRequest {
    text: String,
}

#[derive(Deserialize)]
struct OpenExternalRequest {
    url: String,
}

#[derive(Deserialize)]
struct StorageReadRequest {
    name: String,
}

#[derive(Deserialize)]
struct StorageWriteRequest {
    name: String,
    text: String,
}

#[derive(Deserialize)]
struct StorageWriteJsonRequest {
    name: String,
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct RecordIdRequest {
    id: String,
}

#[derive(Deserialize)]
struct UserScopedRequest {
    user_id: String,
}

#[derive(Deserialize)]
struct RecordAddRequest {
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct RecordUpdateRequest {
    id: String,
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct TaskCategoryRequest {
    id: String,
    category: String,
}

#[derive(Deserialize)]
struct LeaveEmployeesSetRequest {
    employees: serde_json::Value,
}

#[derive(Deserialize)]
struct LeaveMonthRequest {
    month: Option<String>,
}

#[derive(Deserialize)]
struct LeaveEmployeeUpdateRequest {
    month: String,
    employee_id: String,
    name: Option<String>,
    monthly_leave_allowance: Option<i64>,
}

#[derive(Deserialize)]
struct LeaveDayRequest {
    date: String,
}

#[derive(Deserialize)]
struct LeaveSlotRequest {
    date: String,
    slot_id: String,
}

#[derive(Deserialize)]
struct LeaveAssignRequest {
    date: String,
    slot_id: String,
    employee_id: String,
}

#[derive(Deserialize)]
struct LeaveMoveRequest {
    from: String,
    to: String,
    slot_id: String,
    position: Option<usize>,
}

#[derive(Deserialize)]
struct LeaveReorderRequest {
    date: String,
    slot_ids: Vec<String>,
}

#[derive(Deserialize)]
struct LeaveExportRequest {
    month: String,
    filename: Option<String>,
}

#[tauri::command]
fn app_version(app: AppHandle) -> String {
    app.package_info().version.to_string()
}

#[tauri::command]
fn clipboard_write(app: AppHandle, payload: ClipboardWriteRequest) -> Result<bool, String> {
    app.clipboard()
        .write_text(payload.text)
        .map_err(|err| err.to_string())?;
    Ok(true)
}

#[tauri::command]
fn open_external(app: AppHandle, payload: OpenExternalRequest) -> Result<bool, String> {
    app.opener()
        .open_url(payload.url, Option::<String>::None)
        .map_err(|err: tauri_plugin_opener::Error| err.to_string())?;
    Ok(true)
}

#[tauri::command]
fn storage_info(app: AppHandle) -> Result<StorageInfoResult, String> {
    let root = storage_root_dir(&app)?;
    Ok(StorageInfoResult {
        ok: true,
        path_label: root.to_string_lossy().to_string(),
    })
}

#[tauri::command]
fn storage_read_text(
    app: AppHandle,
    payload: StorageReadRequest,
) -> Result<Option<String>, String> {
    let root = storage_root_dir(&app)?;
    let rel = sanitize_relative_path(payload.name.as_str())?;
    let path = root.join(rel);
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path).map_err(|err| err.to_string())?;
    Ok(Some(data))
}

#[tauri::command]
fn storage_write_text(app: AppHandle, payload: StorageWriteRequest) -> Result<bool, String> {
    let root = storage_root_dir(&app)?;
    let rel = sanitize_relative_path(payload.name.as_str())?;
    let path = root.join(rel);
    write_text_file(path, payload.text.as_str())?;
    Ok(true)
}

#[tauri::command]
fn storage_read_json(
    app: AppHandle,
    payload: StorageReadRequest,
) -> Result<Option<serde_json::Value>, String> {
    let rel = sanitize_relative_path(payload.name.as_str())?;
    let name = rel.to_string_lossy().to_string();
    let value = load_record(&app, name.as_str());
    if value.is_null() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

#[tauri::command]
fn storage_write_json(app: AppHandle, payload: StorageWriteJsonRequest) -> Result<bool, String> {
    let rel = sanitize_relative_path(payload.name.as_str())?;
    let name = rel.to_string_lossy().to_string();
    if let Ok(mut cache) = record_cache().lock() {
        cache.insert(name, payload.value.clone());
    }
    let root = storage_root_dir(&app)?;
    let content = serde_json::to_string_pretty(&payload.value).map_err(|err| err.to_string())?;
    write_text_file(root.join(rel), content.as_str())?;
    Ok(true)
}

#[tauri::command]
fn users_get(app: AppHandle) -> Result<serde_json::Value, String> {
    let mut users = load_array(&app, USERS_FILE);
    if users.is_empty() {
        users.push(json!({
            "id": new_id(),
            "username": "admin",
            "email": "",
            "role": "admin",
            "status": "offline",
            "permissions": all_permissions(),
            "is_active": true,
            "last_login": now_string(),
        }));
        save_record(&app, USERS_FILE, &json!(users));
    }
    Ok(json!({ "ok": true, "users": users }))
}

#[tauri::command]
fn user_add(app: AppHandle, payload: RecordAddRequest) -> Result<serde_json::Value, String> {
    let user_payload = payload.payload;
    let username = clamp_string(value_ref_string(user_payload.get("username")).as_str(), 60, true);
    if username.is_empty() {
        return Ok(json!({ "ok": false, "error": "Username is required." }));
    }
    let mut users = load_array(&app, USERS_FILE);
    if users
        .iter()
        .any(|user| value_ref_string(user.get("username")) == username)
    {
        return Ok(json!({ "ok": false, "error": "Username is already taken." }));
    }
    let role = sanitize_choice(user_payload.get("role"), &USER_ROLES, "user");
    let permissions = if role == "admin" {
        all_permissions()
    } else {
        sanitize_permissions(user_payload.get("permissions"))
    };
    let user = json!({
        "id": new_id(),
        "username": username,
        "email": clamp_string(value_ref_string(user_payload.get("email")).as_str(), 120, true),
        "role": role,
        "status": sanitize_choice(user_payload.get("status"), &USER_STATUSES, "offline"),
        "permissions": permissions,
        "is_active": user_payload.get("is_active").and_then(|v| v.as_bool()).unwrap_or(true),
        "last_login": now_string(),
    });
    users.push(user.clone());
    save_record(&app, USERS_FILE, &json!(users));
    Ok(json!({ "ok": true, "user": user }))
}

#[tauri::command]
fn user_update(app: AppHandle, payload: RecordUpdateRequest) -> Result<serde_json::Value, String> {
    let user_id = clamp_string(payload.id.as_str(), 128, true);
    let update = payload.payload;
    let mut users = load_array(&app, USERS_FILE);

    if has_key(&update, "username") {
        let username = clamp_string(value_ref_string(update.get("username")).as_str(), 60, true);
        if username.is_empty() {
            return Ok(json!({ "ok": false, "error": "Username is required." }));
        }
        if users.iter().any(|user| {
            value_ref_string(user.get("id")) != user_id
                && value_ref_string(user.get("username")) == username
        }) {
            return Ok(json!({ "ok": false, "error": "Username is already taken." }));
        }
    }

    let Some(user) = users
        .iter_mut()
        .find(|user| value_ref_string(user.get("id")) == user_id)
    else {
        return Ok(json!({ "ok": false, "error": "User not found." }));
    };

    let updated = {
        let Some(user_obj) = user.as_object_mut() else {
            return Ok(json!({ "ok": false, "error": "User not found." }));
        };
        if has_key(&update, "username") {
            let username =
                clamp_string(value_ref_string(update.get("username")).as_str(), 60, true);
            user_obj.insert("username".to_string(), json!(username));
        }
        if has_key(&update, "email") {
            user_obj.insert(
                "email".to_string(),
                json!(clamp_string(
                    value_ref_string(update.get("email")).as_str(),
                    120,
                    true
                )),
            );
        }
        let role = if has_key(&update, "role") {
            let role = sanitize_choice(update.get("role"), &USER_ROLES, "user");
            user_obj.insert("role".to_string(), json!(role.clone()));
            role
        } else {
            value_ref_string(user_obj.get("role"))
        };
        if role == "admin" {
            user_obj.insert("permissions".to_string(), json!(all_permissions()));
        } else if has_key(&update, "permissions") {
            user_obj.insert(
                "permissions".to_string(),
                json!(sanitize_permissions(update.get("permissions"))),
            );
        }
        if has_key(&update, "status") {
            user_obj.insert(
                "status".to_string(),
                json!(sanitize_choice(
                    update.get("status"),
                    &USER_STATUSES,
                    "offline"
                )),
            );
        }
        if has_key(&update, "is_active") {
            user_obj.insert(
                "is_active".to_string(),
                json!(update
                    .get("is_active")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true)),
            );
        }
        if has_key(&update, "last_login") {
            user_obj.insert(
                "last_login".to_string(),
                json!(clamp_string(
                    value_ref_string(update.get("last_login")).as_str(),
                    40,
                    true
                )),
            );
        }
        serde_json::Value::Object(user_obj.clone())
    };

    save_record(&app, USERS_FILE, &json!(users));
    Ok(json!({ "ok": true, "user": updated }))
}

#[tauri::command]
fn user_delete(app: AppHandle, payload: RecordIdRequest) -> Result<serde_json::Value, String> {
    let user_id = clamp_string(payload.id.as_str(), 128, true);
    let mut users = load_array(&app, USERS_FILE);
    users.retain(|user| value_ref_string(user.get("id")) != user_id);
    save_record(&app, USERS_FILE, &json!(users));
    Ok(json!({ "ok": true, "users": users }))
}

#[tauri::command]
fn settings_get(app: AppHandle, payload: UserScopedRequest) -> Result<serde_json::Value, String> {
    let user_id = clamp_string(payload.user_id.as_str(), 128, true);
    if user_id.is_empty() {
        return Err("Missing user_id.".to_string());
    }
    let mut settings = load_array(&app, SETTINGS_FILE);
    if let Some(existing) = settings
        .iter()
        .find(|entry| value_ref_string(entry.get("user_id")) == user_id)
    {
        return Ok(json!({ "ok": true, "settings": existing }));
    }
    let defaults = json!({
        "user_id": user_id,
        "language": "en",
        "theme": "light",
        "custom_colors": {},
    });
    settings.push(defaults.clone());
    save_record(&app, SETTINGS_FILE, &json!(settings));
    Ok(json!({ "ok": true, "settings": defaults }))
}

#[tauri::command]
fn settings_set(app: AppHandle, payload: RecordAddRequest) -> Result<serde_json::Value, String> {
    let incoming = payload.payload;
    let user_id = clamp_string(value_ref_string(incoming.get("user_id")).as_str(), 128, true);
    if user_id.is_empty() {
        return Err("Missing user_id.".to_string());
    }
    let mut settings = load_array(&app, SETTINGS_FILE);
    let index = settings
        .iter()
        .position(|entry| value_ref_string(entry.get("user_id")) == user_id);
    let mut entry = match index {
        Some(index) => settings[index].clone(),
        None => json!({
            "user_id": user_id,
            "language": "en",
            "theme": "light",
            "custom_colors": {},
        }),
    };
    if let Some(entry_obj) = entry.as_object_mut() {
        // Invalid choices leave the stored value untouched.
        if let Some(language) = valid_choice(incoming.get("language"), &LANGUAGES) {
            entry_obj.insert("language".to_string(), json!(language));
        }
        if let Some(theme) = valid_choice(incoming.get("theme"), &THEMES) {
            entry_obj.insert("theme".to_string(), json!(theme));
        }
        if incoming
            .get("custom_colors")
            .is_some_and(|value| value.is_object())
        {
            entry_obj.insert(
                "custom_colors".to_string(),
                incoming.get("custom_colors").cloned().unwrap_or(json!({})),
            );
        }
    }
    match index {
        Some(index) => settings[index] = entry.clone(),
        None => settings.push(entry.clone()),
    }
    save_record(&app, SETTINGS_FILE, &json!(settings));
    Ok(json!({ "ok": true, "settings": entry }))
}

#[tauri::command]
fn tasks_get(app: AppHandle, payload: UserScopedRequest) -> Result<serde_json::Value, String> {
    let user_id = clamp_string(payload.user_id.as_str(), 128, true);
    if user_id.is_empty() {
        return Err("Missing user_id.".to_string());
    }
    let mut tasks: Vec<serde_json::Value> = load_array(&app, TASKS_FILE)
        .into_iter()
        .filter(|task| value_ref_string(task.get("user_id")) == user_id)
        .collect();
    tasks.sort_by_key(|task| value_i64(task.get("order")));
    Ok(json!({ "ok": true, "tasks": tasks }))
}

#[tauri::command]
fn task_add(app: AppHandle, payload: RecordAddRequest) -> Result<serde_json::Value, String> {
    let task_payload = payload.payload;
    let user_id = clamp_string(value_ref_string(task_payload.get("user_id")).as_str(), 128, true);
    if user_id.is_empty() {
        return Err("Missing user_id.".to_string());
    }
    let title = clamp_string(value_ref_string(task_payload.get("title")).as_str(), 200, true);
    if title.is_empty() {
        return Ok(json!({ "ok": false, "error": "Title is required." }));
    }
    let category = sanitize_choice(
        task_payload.get("category"),
        &TASK_CATEGORIES,
        "not_urgent_not_important",
    );
    let mut tasks = load_array(&app, TASKS_FILE);
    let next_order = tasks
        .iter()
        .filter(|task| {
            value_ref_string(task.get("user_id")) == user_id
                && value_ref_string(task.get("category")) == category
        })
        .map(|task| value_i64(task.get("order")))
        .max()
        .unwrap_or(0)
        + 1;
    let now = now_string();
    let task = json!({
        "id": new_id(),
        "user_id": user_id,
        "title": title,
        "description": clamp_string(
            value_ref_string(task_payload.get("description")).as_str(),
            2000,
            false
        ),
        "category": category.clone(),
        "status": sanitize_choice(task_payload.get("status"), &TASK_STATUSES, "todo"),
        "priority_color": category_color(category.as_str()),
        "due_date": clamp_string(value_ref_string(task_payload.get("due_date")).as_str(), 40, true),
        "reminder_time": clamp_string(
            value_ref_string(task_payload.get("reminder_time")).as_str(),
            40,
            true
        ),
        "alarm": clamp_string(value_ref_string(task_payload.get("alarm")).as_str(), 40, true),
        "order": next_order,
        "created_at": now,
        "updated_at": now,
    });
    tasks.push(task.clone());
    save_record(&app, TASKS_FILE, &json!(tasks));
    Ok(json!({ "ok": true, "task": task }))
}

#[tauri::command]
fn task_update(app: AppHandle, payload: RecordUpdateRequest) -> Result<serde_json::Value, String> {
    let task_id = clamp_string(payload.id.as_str(), 128, true);
    let update = payload.payload;
    let mut tasks = load_array(&app, TASKS_FILE);
    let Some(task) = tasks
        .iter_mut()
        .find(|task| value_ref_string(task.get("id")) == task_id)
    else {
        return Ok(json!({ "ok": false, "error": "Task not found." }));
    };

    let updated = {
        let Some(task_obj) = task.as_object_mut() else {
            return Ok(json!({ "ok": false, "error": "Task not found." }));
        };
        if has_key(&update, "title") {
            let title = clamp_string(value_ref_string(update.get("title")).as_str(), 200, true);
            if !title.is_empty() {
                task_obj.insert("title".to_string(), json!(title));
            }
        }
        if has_key(&update, "description") {
            task_obj.insert(
                "description".to_string(),
                json!(clamp_string(
                    value_ref_string(update.get("description")).as_str(),
                    2000,
                    false
                )),
            );
        }
        if has_key(&update, "category") {
            let category = sanitize_choice(
                update.get("category"),
                &TASK_CATEGORIES,
                "not_urgent_not_important",
            );
            task_obj.insert(
                "priority_color".to_string(),
                json!(category_color(category.as_str())),
            );
            task_obj.insert("category".to_string(), json!(category));
        }
        if has_key(&update, "status") {
            task_obj.insert(
                "status".to_string(),
                json!(sanitize_choice(update.get("status"), &TASK_STATUSES, "todo")),
            );
        }
        for field in ["due_date", "reminder_time", "alarm"] {
            if has_key(&update, field) {
                task_obj.insert(
                    field.to_string(),
                    json!(clamp_string(
                        value_ref_string(update.get(field)).as_str(),
                        40,
                        true
                    )),
                );
            }
        }
        if has_key(&update, "order") {
            task_obj.insert("order".to_string(), json!(value_i64(update.get("order"))));
        }
        task_obj.insert("updated_at".to_string(), json!(now_string()));
        serde_json::Value::Object(task_obj.clone())
    };

    save_record(&app, TASKS_FILE, &json!(tasks));
    Ok(json!({ "ok": true, "task": updated }))
}

#[tauri::command]
fn task_set_category(
    app: AppHandle,
    payload: TaskCategoryRequest,
) -> Result<serde_json::Value, String> {
    let task_id = clamp_string(payload.id.as_str(), 128, true);
    let Some(category) = valid_choice(Some(&json!(payload.category)), &TASK_CATEGORIES) else {
        return Ok(json!({ "ok": false, "error": "Invalid category." }));
    };
    let mut tasks = load_array(&app, TASKS_FILE);
    let Some(index) = tasks
        .iter()
        .position(|task| value_ref_string(task.get("id")) == task_id)
    else {
        return Ok(json!({ "ok": false, "error": "Task not found." }));
    };

    // A card dropped into a quadrant lands at the end of that quadrant.
    let user_id = value_ref_string(tasks[index].get("user_id"));
    let next_order = tasks
        .iter()
        .filter(|task| {
            value_ref_string(task.get("user_id")) == user_id
                && value_ref_string(task.get("category")) == category
        })
        .map(|task| value_i64(task.get("order")))
        .max()
        .unwrap_or(0)
        + 1;

    let updated = {
        let Some(task_obj) = tasks[index].as_object_mut() else {
            return Ok(json!({ "ok": false, "error": "Task not found." }));
        };
        task_obj.insert("category".to_string(), json!(category.clone()));
        task_obj.insert(
            "priority_color".to_string(),
            json!(category_color(category.as_str())),
        );
        task_obj.insert("order".to_string(), json!(next_order));
        task_obj.insert("updated_at".to_string(), json!(now_string()));
        serde_json::Value::Object(task_obj.clone())
    };

    save_record(&app, TASKS_FILE, &json!(tasks));
    Ok(json!({ "ok": true, "task": updated }))
}

#[tauri::command]
fn task_delete(app: AppHandle, payload: RecordIdRequest) -> Result<serde_json::Value, String> {
    let task_id = clamp_string(payload.id.as_str(), 128, true);
    let mut tasks = load_array(&app, TASKS_FILE);
    tasks.retain(|task| value_ref_string(task.get("id")) != task_id);
    save_record(&app, TASKS_FILE, &json!(tasks));
    Ok(json!({ "ok": true }))
}

#[tauri::command]
fn notes_get(app: AppHandle, payload: UserScopedRequest) -> Result<serde_json::Value, String> {
    let user_id = clamp_string(payload.user_id.as_str(), 128, true);
    if user_id.is_empty() {
        return Err("Missing user_id.".to_string());
    }
    let notes: Vec<serde_json::Value> = load_array(&app, NOTES_FILE)
        .into_iter()
        .filter(|note| value_ref_string(note.get("user_id")) == user_id)
        .collect();
    Ok(json!({ "ok": true, "notes": notes }))
}

#[tauri::command]
fn note_add(app: AppHandle, payload: RecordAddRequest) -> Result<serde_json::Value, String> {
    let note_payload = payload.payload;
    let user_id = clamp_string(value_ref_string(note_payload.get("user_id")).as_str(), 128, true);
    if user_id.is_empty() {
        return Err("Missing user_id.".to_string());
    }
    let now = now_string();
    let note = json!({
        "id": new_id(),
        "user_id": user_id,
        "content": clamp_string(
            value_ref_string(note_payload.get("content")).as_str(),
            10_000,
            false
        ),
        "created_at": now,
        "updated_at": now,
    });
    let mut notes = load_array(&app, NOTES_FILE);
    notes.push(note.clone());
    save_record(&app, NOTES_FILE, &json!(notes));
    Ok(json!({ "ok": true, "note": note }))
}

#[tauri::command]
fn note_update(app: AppHandle, payload: RecordUpdateRequest) -> Result<serde_json::Value, String> {
    let note_id = clamp_string(payload.id.as_str(), 128, true);
    let update = payload.payload;
    let mut notes = load_array(&app, NOTES_FILE);
    let Some(note) = notes
        .iter_mut()
        .find(|note| value_ref_string(note.get("id")) == note_id)
    else {
        return Ok(json!({ "ok": false, "error": "Note not found." }));
    };

    let updated = {
        let Some(note_obj) = note.as_object_mut() else {
            return Ok(json!({ "ok": false, "error": "Note not found." }));
        };
        if has_key(&update, "content") {
            note_obj.insert(
                "content".to_string(),
                json!(clamp_string(
                    value_ref_string(update.get("content")).as_str(),
                    10_000,
                    false
                )),
            );
        }
        note_obj.insert("updated_at".to_string(), json!(now_string()));
        serde_json::Value::Object(note_obj.clone())
    };

    save_record(&app, NOTES_FILE, &json!(notes));
    Ok(json!({ "ok": true, "note": updated }))
}

#[tauri::command]
fn note_delete(app: AppHandle, payload: RecordIdRequest) -> Result<serde_json::Value, String> {
    let note_id = clamp_string(payload.id.as_str(), 128, true);
    let mut notes = load_array(&app, NOTES_FILE);
    notes.retain(|note| value_ref_string(note.get("id")) != note_id);
    save_record(&app, NOTES_FILE, &json!(notes));
    Ok(json!({ "ok": true }))
}

#[tauri::command]
fn leave_employees_get(app: AppHandle) -> Result<serde_json::Value, String> {
    let records = load_leave_records(&app);
    Ok(json!({ "ok": true, "employees": records.roster }))
}

#[tauri::command]
fn leave_employees_set(
    app: AppHandle,
    payload: LeaveEmployeesSetRequest,
) -> Result<serde_json::Value, String> {
    let entries = normalize_roster_entries(&payload.employees);
    if let Some(duplicate) = duplicate_employee_name(entries.as_slice()) {
        let records = load_leave_records(&app);
        return Ok(json!({
            "ok": false,
            "error": format!("Duplicate employee name: {duplicate}."),
            "employees": records.roster,
        }));
    }
    save_record(&app, EMPLOYEES_FILE, &json!(entries));
    Ok(json!({ "ok": true, "employees": entries }))
}

#[tauri::command]
fn leave_calendar_get(
    app: AppHandle,
    payload: LeaveMonthRequest,
) -> Result<serde_json::Value, String> {
    let month_start = resolve_month(payload.month.as_deref());
    let calendar = leave_calendar_value(&app, month_start)?;
    Ok(json!({ "ok": true, "calendar": calendar }))
}

#[tauri::command]
fn leave_calendar_prev(
    app: AppHandle,
    payload: LeaveMonthRequest,
) -> Result<serde_json::Value, String> {
    let month_start = shift_month(resolve_month(payload.month.as_deref()), false);
    let calendar = leave_calendar_value(&app, month_start)?;
    Ok(json!({ "ok": true, "calendar": calendar }))
}

#[tauri::command]
fn leave_calendar_next(
    app: AppHandle,
    payload: LeaveMonthRequest,
) -> Result<serde_json::Value, String> {
    let month_start = shift_month(resolve_month(payload.month.as_deref()), true);
    let calendar = leave_calendar_value(&app, month_start)?;
    Ok(json!({ "ok": true, "calendar": calendar }))
}

#[tauri::command]
fn leave_month_update_employee(
    app: AppHandle,
    payload: LeaveEmployeeUpdateRequest,
) -> Result<serde_json::Value, String> {
    let month_start =
        parse_month_key(payload.month.as_str()).ok_or_else(|| "Invalid month key.".to_string())?;
    let mut records = load_leave_records(&app);
    let key = month_key(month_start);
    let mut month_roster = ensure_month_roster(&app, &mut records, month_start);

    let outcome = update_month_employee(
        &mut month_roster,
        clamp_string(payload.employee_id.as_str(), 128, true).as_str(),
        payload.name.as_deref(),
        payload.monthly_leave_allowance,
    );
    if outcome.is_ok() {
        records.monthly.insert(key, json!(month_roster));
        save_record(
            &app,
            MONTHLY_EMPLOYEES_FILE,
            &serde_json::Value::Object(records.monthly.clone()),
        );
    }

    let (start, end) = month_bounds(month_start).ok_or_else(|| "Invalid month key.".to_string())?;
    let calendar = build_calendar_payload(start, end, month_roster.as_slice(), &records.vacations);
    Ok(leave_result(outcome, calendar))
}

#[tauri::command]
fn leave_slot_add(app: AppHandle, payload: LeaveDayRequest) -> Result<serde_json::Value, String> {
    let date =
        parse_date_key(payload.date.as_str()).ok_or_else(|| "Invalid date key.".to_string())?;
    let month_start = first_of_month(date);
    let mut records = load_leave_records(&app);
    let month_roster = ensure_month_roster(&app, &mut records, month_start);

    let outcome = match add_slot(&mut records.vacations, date_key(date).as_str()) {
        Some(_) => {
            save_record(
                &app,
                VACATIONS_FILE,
                &serde_json::Value::Object(records.vacations.clone()),
            );
            Ok(())
        }
        None => Err("That day already has two leave slots.".to_string()),
    };

    let (start, end) = month_bounds(month_start).ok_or_else(|| "Invalid date key.".to_string())?;
    let calendar = build_calendar_payload(start, end, month_roster.as_slice(), &records.vacations);
    Ok(leave_result(outcome, calendar))
}

#[tauri::command]
fn leave_slot_delete(
    app: AppHandle,
    payload: LeaveSlotRequest,
) -> Result<serde_json::Value, String> {
    let date =
        parse_date_key(payload.date.as_str()).ok_or_else(|| "Invalid date key.".to_string())?;
    let month_start = first_of_month(date);
    let mut records = load_leave_records(&app);
    let month_roster = ensure_month_roster(&app, &mut records, month_start);

    let removed = delete_slot(
        &mut records.vacations,
        date_key(date).as_str(),
        clamp_string(payload.slot_id.as_str(), 128, true).as_str(),
    );
    if removed {
        save_record(
            &app,
            VACATIONS_FILE,
            &serde_json::Value::Object(records.vacations.clone()),
        );
    }

    let (start, end) = month_bounds(month_start).ok_or_else(|| "Invalid date key.".to_string())?;
    let calendar = build_calendar_payload(start, end, month_roster.as_slice(), &records.vacations);
    Ok(json!({ "ok": true, "calendar": calendar }))
}

#[tauri::command]
fn leave_slot_assign(
    app: AppHandle,
    payload: LeaveAssignRequest,
) -> Result<serde_json::Value, String> {
    let date =
        parse_date_key(payload.date.as_str()).ok_or_else(|| "Invalid date key.".to_string())?;
    let month_start = first_of_month(date);
    let mut records = load_leave_records(&app);
    let month_roster = ensure_month_roster(&app, &mut records, month_start);

    let outcome = assign_slot(
        &mut records.vacations,
        month_roster.as_slice(),
        date,
        clamp_string(payload.slot_id.as_str(), 128, true).as_str(),
        clamp_string(payload.employee_id.as_str(), 128, true).as_str(),
    );
    if outcome.is_ok() {
        save_record(
            &app,
            VACATIONS_FILE,
            &serde_json::Value::Object(records.vacations.clone()),
        );
    }

    let (start, end) = month_bounds(month_start).ok_or_else(|| "Invalid date key.".to_string())?;
    let calendar = build_calendar_payload(start, end, month_roster.as_slice(), &records.vacations);
    Ok(leave_result(outcome, calendar))
}

#[tauri::command]
fn leave_slot_move(app: AppHandle, payload: LeaveMoveRequest) -> Result<serde_json::Value, String> {
    let from =
        parse_date_key(payload.from.as_str()).ok_or_else(|| "Invalid date key.".to_string())?;
    let to = parse_date_key(payload.to.as_str()).ok_or_else(|| "Invalid date key.".to_string())?;
    let month_start = first_of_month(from);
    let mut records = load_leave_records(&app);
    let month_roster = ensure_month_roster(&app, &mut records, month_start);

    let outcome = move_slot(
        &mut records.vacations,
        date_key(from).as_str(),
        date_key(to).as_str(),
        clamp_string(payload.slot_id.as_str(), 128, true).as_str(),
        payload.position,
    );
    if outcome.is_ok() {
        save_record(
            &app,
            VACATIONS_FILE,
            &serde_json::Value::Object(records.vacations.clone()),
        );
    }

    let (start, end) = month_bounds(month_start).ok_or_else(|| "Invalid date key.".to_string())?;
    let calendar = build_calendar_payload(start, end, month_roster.as_slice(), &records.vacations);
    Ok(leave_result(outcome, calendar))
}

#[tauri::command]
fn leave_day_reorder(
    app: AppHandle,
    payload: LeaveReorderRequest,
) -> Result<serde_json::Value, String> {
    let date =
        parse_date_key(payload.date.as_str()).ok_or_else(|| "Invalid date key.".to_string())?;
    let month_start = first_of_month(date);
    let ordered_ids: Vec<String> = payload
        .slot_ids
        .into_iter()
        .map(|id| clamp_string(id.as_str(), 128, true))
        .filter(|id| !id.is_empty())
        .collect();
    let mut records = load_leave_records(&app);
    let month_roster = ensure_month_roster(&app, &mut records, month_start);

    let changed = reorder_day(
        &mut records.vacations,
        date_key(date).as_str(),
        ordered_ids.as_slice(),
    );
    if changed {
        save_record(
            &app,
            VACATIONS_FILE,
            &serde_json::Value::Object(records.vacations.clone()),
        );
    }

    let (start, end) = month_bounds(month_start).ok_or_else(|| "Invalid date key.".to_string())?;
    let calendar = build_calendar_payload(start, end, month_roster.as_slice(), &records.vacations);
    Ok(json!({ "ok": true, "calendar": calendar }))
}

#[tauri::command]
fn leave_export_csv(app: AppHandle, payload: LeaveExportRequest) -> Result<SaveCsvResult, String> {
    let month_start =
        parse_month_key(payload.month.as_str()).ok_or_else(|| "Invalid month key.".to_string())?;
    let mut records = load_leave_records(&app);
    let month_roster = ensure_month_roster(&app, &mut records, month_start);
    let (start, end) = month_bounds(month_start).ok_or_else(|| "Invalid month key.".to_string())?;
    let content = build_leave_csv(start, end, month_roster.as_slice(), &records.vacations);
    let filename = payload
        .filename
        .unwrap_or_else(|| format!("mueen-leave-{}.csv", month_key(month_start)));
    save_csv_dialog(sanitize_export_filename(filename.as_str()).as_str(), content.as_str())
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn nonempty_string(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        Some(serde_json::Value::Bool(boolean)) => Some(boolean.to_string()),
        _ => None,
    }
}

fn nonempty_value(value: Option<&serde_json::Value>) -> Option<String> {
    let text = value_ref_string(value);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn value_ref_string(value: Option<&serde_json::Value>) -> String {
    nonempty_string(value).unwrap_or_default()
}

fn value_i64(value: Option<&serde_json::Value>) -> i64 {
    match value {
        Some(v) => {
            if let Some(num) = v.as_i64() {
                num
            } else if let Some(num) = v.as_u64() {
                num as i64
            } else if let Some(num) = v.as_f64() {
                num.round() as i64
            } else if let Some(text) = v.as_str() {
                text.trim().parse::<i64>().unwrap_or(0)
            } else {
                0
            }
        }
        None => 0,
    }
}

fn parse_nonnegative_integer(value: Option<&serde_json::Value>) -> i64 {
    value_i64(value).max(0)
}

fn has_key(value: &serde_json::Value, key: &str) -> bool {
    value
        .as_object()
        .map(|obj| obj.contains_key(key))
        .unwrap_or(false)
}

fn clamp_string(value: &str, max_len: usize, trim: bool) -> String {
    let mut out = if trim {
        value.trim().to_string()
    } else {
        value.to_string()
    };
    out = out
        .chars()
        .filter(|ch| {
            let code = *ch as u32;
            code >= 32 && code != 127
        })
        .collect();
    if out.chars().count() > max_len {
        out = out.chars().take(max_len).collect();
    }
    out
}

fn valid_choice(value: Option<&serde_json::Value>, allowed: &[&str]) -> Option<String> {
    let text = clamp_string(value_ref_string(value).as_str(), 60, true);
    if allowed.contains(&text.as_str()) {
        Some(text)
    } else {
        None
    }
}

fn sanitize_choice(value: Option<&serde_json::Value>, allowed: &[&str], fallback: &str) -> String {
    valid_choice(value, allowed).unwrap_or_else(|| fallback.to_string())
}

fn all_permissions() -> Vec<String> {
    PERMISSIONS.iter().map(|name| name.to_string()).collect()
}

fn sanitize_permissions(value: Option<&serde_json::Value>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in value.and_then(|v| v.as_array()).cloned().unwrap_or_default() {
        let name = value_ref_string(Some(&entry));
        if PERMISSIONS.contains(&name.as_str()) && seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}

fn category_color(category: &str) -> &'static str {
    match category {
        "urgent_important" => "bg-priority-urgent",
        "urgent_not_important" => "bg-priority-high",
        "not_urgent_important" => "bg-priority-medium",
        _ => "bg-priority-low",
    }
}

fn month_key(month_start: NaiveDate) -> String {
    month_start.format("%Y-%m").to_string()
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_month_key(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(format!("{}-01", value.trim()).as_str(), "%Y-%m-%d").ok()
}

fn parse_date_key(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn current_month_start() -> NaiveDate {
    first_of_month(Utc::now().date_naive())
}

fn resolve_month(value: Option<&str>) -> NaiveDate {
    value
        .and_then(parse_month_key)
        .unwrap_or_else(current_month_start)
}

fn month_bounds(month_start: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = first_of_month(month_start);
    let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((start, end))
}

fn shift_month(month_start: NaiveDate, forward: bool) -> NaiveDate {
    let start = first_of_month(month_start);
    let shifted = if forward {
        start.checked_add_months(Months::new(1))
    } else {
        start.checked_sub_months(Months::new(1))
    };
    shifted.unwrap_or(start)
}

fn normalize_roster_entries(value: &serde_json::Value) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    for entry in value.as_array().cloned().unwrap_or_default() {
        let id = nonempty_value(entry.get("id")).unwrap_or_else(new_id);
        let name = clamp_string(value_ref_string(entry.get("name")).as_str(), 80, true);
        // Records written before the stable-id migration carried camelCase keys.
        let allowance = parse_nonnegative_integer(
            entry
                .get("monthly_leave_allowance")
                .or_else(|| entry.get("monthlyLeaveAllowance")),
        );
        out.push(json!({
            "id": id,
            "name": name,
            "monthly_leave_allowance": allowance,
        }));
    }
    out
}

fn duplicate_employee_name(entries: &[serde_json::Value]) -> Option<String> {
    let mut seen = HashSet::new();
    for entry in entries {
        let name = value_ref_string(entry.get("name"));
        if !name.is_empty() && !seen.insert(name.clone()) {
            return Some(name);
        }
    }
    None
}

fn normalize_monthly_value(
    value: &serde_json::Value,
) -> serde_json::Map<String, serde_json::Value> {
    let mut out = serde_json::Map::new();
    let Some(entries) = value.as_object() else {
        return out;
    };
    for (key, snapshot) in entries {
        let Some(month_start) = parse_month_key(key.as_str()) else {
            continue;
        };
        out.insert(
            month_key(month_start),
            json!(normalize_roster_entries(snapshot)),
        );
    }
    out
}

fn find_employee_id_by_name(roster: &[serde_json::Value], name: &str) -> Option<String> {
    roster
        .iter()
        .find(|entry| value_ref_string(entry.get("name")) == name)
        .map(|entry| value_ref_string(entry.get("id")))
}

fn employee_name(roster: &[serde_json::Value], employee_id: &str) -> String {
    if employee_id.is_empty() {
        return String::new();
    }
    roster
        .iter()
        .find(|entry| value_ref_string(entry.get("id")) == employee_id)
        .map(|entry| value_ref_string(entry.get("name")))
        .unwrap_or_default()
}

fn normalize_slot(
    entry: &serde_json::Value,
    month_roster: &[serde_json::Value],
    fallback: &[serde_json::Value],
) -> serde_json::Value {
    let id = nonempty_value(entry.get("id")).unwrap_or_else(new_id);
    let mut employee_id = clamp_string(
        value_ref_string(entry.get("employee_id")).as_str(),
        128,
        true,
    );
    if employee_id.is_empty() && has_key(entry, "text") {
        // Legacy slots stored the assigned employee's display name; an
        // unmatched name degrades to an unassigned slot.
        let name = clamp_string(value_ref_string(entry.get("text")).as_str(), 80, true);
        if !name.is_empty() {
            employee_id = find_employee_id_by_name(month_roster, name.as_str())
                .or_else(|| find_employee_id_by_name(fallback, name.as_str()))
                .unwrap_or_default();
        }
    }
    json!({ "id": id, "employee_id": employee_id })
}

fn normalize_vacations_value(
    value: &serde_json::Value,
    monthly: &serde_json::Map<String, serde_json::Value>,
    roster: &[serde_json::Value],
) -> serde_json::Map<String, serde_json::Value> {
    let mut out = serde_json::Map::new();
    let Some(entries) = value.as_object() else {
        return out;
    };
    for (key, day_value) in entries {
        let Some(date) = parse_date_key(key.as_str()) else {
            continue;
        };
        let month_roster = monthly
            .get(month_key(first_of_month(date)).as_str())
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(roster);
        let mut slots = Vec::new();
        for entry in day_value.as_array().cloned().unwrap_or_default() {
            slots.push(normalize_slot(&entry, month_roster, roster));
            if slots.len() == DAY_SLOT_CAPACITY {
                break;
            }
        }
        out.insert(date_key(date), json!(slots));
    }
    out
}

fn roster_for_month(
    monthly: &mut serde_json::Map<String, serde_json::Value>,
    roster: &[serde_json::Value],
    key: &str,
) -> (Vec<serde_json::Value>, bool) {
    if let Some(existing) = monthly.get(key).and_then(|v| v.as_array()) {
        return (existing.clone(), false);
    }
    // First view of a month snapshots the live roster; later roster edits
    // never rewrite an existing snapshot.
    let snapshot: Vec<serde_json::Value> = roster.to_vec();
    monthly.insert(key.to_string(), json!(snapshot));
    (snapshot, true)
}

fn update_month_employee(
    month_roster: &mut [serde_json::Value],
    employee_id: &str,
    name: Option<&str>,
    allowance: Option<i64>,
) -> Result<(), String> {
    let next_name = name.map(|value| clamp_string(value, 80, true));
    if let Some(next) = next_name.as_deref() {
        if !next.is_empty()
            && month_roster.iter().any(|entry| {
                value_ref_string(entry.get("id")) != employee_id
                    && value_ref_string(entry.get("name")) == next
            })
        {
            return Err("An employee with that name already exists this month.".to_string());
        }
    }
    let Some(entry) = month_roster
        .iter_mut()
        .find(|entry| value_ref_string(entry.get("id")) == employee_id)
    else {
        return Err("Unknown employee.".to_string());
    };
    if let Some(entry_obj) = entry.as_object_mut() {
        if let Some(next) = next_name {
            entry_obj.insert("name".to_string(), json!(next));
        }
        if let Some(allowance) = allowance {
            entry_obj.insert(
                "monthly_leave_allowance".to_string(),
                json!(allowance.max(0)),
            );
        }
    }
    Ok(())
}

fn count_for_employee(
    vacations: &serde_json::Map<String, serde_json::Value>,
    employee_id: &str,
    month_start: NaiveDate,
    month_end: NaiveDate,
) -> i64 {
    if employee_id.is_empty() {
        return 0;
    }
    let mut used = 0;
    for (key, slots) in vacations {
        let Some(date) = parse_date_key(key.as_str()) else {
            continue;
        };
        if date < month_start || date > month_end {
            continue;
        }
        for slot in slots.as_array().cloned().unwrap_or_default() {
            if value_ref_string(slot.get("employee_id")) == employee_id {
                used += 1;
            }
        }
    }
    used
}

fn add_slot(
    vacations: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    let mut items = vacations
        .get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    if items.len() >= DAY_SLOT_CAPACITY {
        return None;
    }
    let id = new_id();
    items.push(json!({ "id": id, "employee_id": "" }));
    vacations.insert(key.to_string(), json!(items));
    Some(id)
}

fn delete_slot(
    vacations: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
    slot_id: &str,
) -> bool {
    let mut items = vacations
        .get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let before = items.len();
    items.retain(|slot| value_ref_string(slot.get("id")) != slot_id);
    if items.len() == before {
        return false;
    }
    vacations.insert(key.to_string(), json!(items));
    true
}

fn assign_slot(
    vacations: &mut serde_json::Map<String, serde_json::Value>,
    month_roster: &[serde_json::Value],
    date: NaiveDate,
    slot_id: &str,
    employee_id: &str,
) -> Result<(), String> {
    if employee_id.is_empty() {
        // Clearing an assignment goes through delete, not a blank name.
        return Err("An employee is required.".to_string());
    }
    let Some(employee) = month_roster
        .iter()
        .find(|entry| value_ref_string(entry.get("id")) == employee_id)
    else {
        return Err("Unknown employee.".to_string());
    };
    let name = value_ref_string(employee.get("name"));
    if name.is_empty() {
        return Err("Unknown employee.".to_string());
    }

    let key = date_key(date);
    let mut items = vacations
        .get(key.as_str())
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let Some(index) = items
        .iter()
        .position(|slot| value_ref_string(slot.get("id")) == slot_id)
    else {
        return Err("Unknown slot.".to_string());
    };
    if value_ref_string(items[index].get("employee_id")) == employee_id {
        return Ok(());
    }

    // The slot does not currently count toward the target employee, so the
    // cap check works for fresh assignments and reassignments alike.
    let Some((month_start, month_end)) = month_bounds(date) else {
        return Err("Invalid date key.".to_string());
    };
    let allowance = parse_nonnegative_integer(employee.get("monthly_leave_allowance"));
    let used = count_for_employee(vacations, employee_id, month_start, month_end);
    if used >= allowance {
        return Err(format!("{name} has no remaining leave this month."));
    }

    if let Some(slot_obj) = items[index].as_object_mut() {
        slot_obj.insert("employee_id".to_string(), json!(employee_id));
    }
    vacations.insert(key, json!(items));
    Ok(())
}

fn move_slot(
    vacations: &mut serde_json::Map<String, serde_json::Value>,
    from_key: &str,
    to_key: &str,
    slot_id: &str,
    position: Option<usize>,
) -> Result<(), String> {
    let mut source = vacations
        .get(from_key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let Some(index) = source
        .iter()
        .position(|slot| value_ref_string(slot.get("id")) == slot_id)
    else {
        return Err("Unknown slot.".to_string());
    };

    if from_key == to_key {
        // A same-day reorder never changes the day's slot count.
        let slot = source.remove(index);
        let at = position.unwrap_or(source.len()).min(source.len());
        source.insert(at, slot);
        vacations.insert(from_key.to_string(), json!(source));
        return Ok(());
    }

    // Capacity is checked against the pre-move state; a full destination
    // rejects the whole move and both days stay untouched.
    let mut dest = vacations
        .get(to_key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    if dest.len() >= DAY_SLOT_CAPACITY {
        return Err("That day already has two leave slots.".to_string());
    }
    let slot = source.remove(index);
    let at = position.unwrap_or(dest.len()).min(dest.len());
    dest.insert(at, slot);
    vacations.insert(from_key.to_string(), json!(source));
    vacations.insert(to_key.to_string(), json!(dest));
    Ok(())
}

fn reorder_day(
    vacations: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
    ordered_ids: &[String],
) -> bool {
    let Some(items) = vacations.get(key).and_then(|v| v.as_array()).cloned() else {
        return false;
    };
    let mut by_id = HashMap::new();
    for slot in &items {
        by_id.insert(value_ref_string(slot.get("id")), slot.clone());
    }

    let mut ordered = Vec::new();
    let mut seen = HashSet::new();
    for id in ordered_ids {
        if seen.contains(id) {
            continue;
        }
        if let Some(slot) = by_id.get(id) {
            ordered.push(slot.clone());
            seen.insert(id.clone());
        }
    }
    for slot in &items {
        let id = value_ref_string(slot.get("id"));
        if !seen.contains(&id) {
            ordered.push(slot.clone());
        }
    }

    if ordered == items {
        return false;
    }
    vacations.insert(key.to_string(), json!(ordered));
    true
}

fn build_calendar_payload(
    month_start: NaiveDate,
    month_end: NaiveDate,
    month_roster: &[serde_json::Value],
    vacations: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    let mut days = Vec::new();
    for date in month_start.iter_days().take_while(|date| *date <= month_end) {
        let key = date_key(date);
        let slots = vacations
            .get(key.as_str())
            .cloned()
            .unwrap_or_else(|| json!([]));
        days.push(json!({ "date": key, "slots": slots }));
    }

    let mut employees = Vec::new();
    let mut total_allowance = 0_i64;
    let mut can_add = false;
    for entry in month_roster {
        let id = value_ref_string(entry.get("id"));
        let name = value_ref_string(entry.get("name"));
        let allowance = parse_nonnegative_integer(entry.get("monthly_leave_allowance"));
        let used = count_for_employee(vacations, id.as_str(), month_start, month_end);
        if !name.is_empty() {
            total_allowance += allowance;
            if used < allowance {
                can_add = true;
            }
        }
        employees.push(json!({
            "id": id,
            "name": name,
            "monthly_leave_allowance": allowance,
            "used": used,
            "remaining": (allowance - used).max(0),
        }));
    }

    let staffed = month_roster
        .iter()
        .filter(|entry| !value_ref_string(entry.get("name")).is_empty())
        .count();
    let mut used_days = 0_i64;
    for (key, slots) in vacations {
        let Some(date) = parse_date_key(key.as_str()) else {
            continue;
        };
        if date < month_start || date > month_end {
            continue;
        }
        used_days += slots.as_array().map(|items| items.len() as i64).unwrap_or(0);
    }

    json!({
        "month": month_key(month_start),
        "month_start": date_key(month_start),
        "month_end": date_key(month_end),
        "padding": month_start.weekday().num_days_from_monday(),
        "days": days,
        "employees": employees,
        "summary": {
            "employees": staffed,
            "total_allowance": total_allowance,
            "used": used_days,
            "remaining": (total_allowance - used_days).max(0),
        },
        "can_add": can_add,
    })
}

fn build_leave_csv(
    month_start: NaiveDate,
    month_end: NaiveDate,
    month_roster: &[serde_json::Value],
    vacations: &serde_json::Map<String, serde_json::Value>,
) -> String {
    let columns: Vec<String> = ["Date", "Weekday", "Slot 1", "Slot 2"]
        .iter()
        .map(|column| column.to_string())
        .collect();
    let mut rows = Vec::new();
    for date in month_start.iter_days().take_while(|date| *date <= month_end) {
        let key = date_key(date);
        let slots = vacations
            .get(key.as_str())
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let mut row = serde_json::Map::new();
        row.insert("Date".to_string(), json!(key));
        row.insert("Weekday".to_string(), json!(date.format("%A").to_string()));
        for index in 0..DAY_SLOT_CAPACITY {
            let name = slots
                .get(index)
                .map(|slot| {
                    employee_name(
                        month_roster,
                        value_ref_string(slot.get("employee_id")).as_str(),
                    )
                })
                .unwrap_or_default();
            row.insert(format!("Slot {}", index + 1), json!(name));
        }
        rows.push(serde_json::Value::Object(row));
    }
    rows_to_csv(columns.as_slice(), rows.as_slice())
}

fn leave_result(outcome: Result<(), String>, calendar: serde_json::Value) -> serde_json::Value {
    match outcome {
        Ok(()) => json!({ "ok": true, "calendar": calendar }),
        Err(error) => json!({ "ok": false, "error": error, "calendar": calendar }),
    }
}

fn leave_calendar_value(
    app: &AppHandle,
    month_start: NaiveDate,
) -> Result<serde_json::Value, String> {
    let mut records = load_leave_records(app);
    let month_roster = ensure_month_roster(app, &mut records, month_start);
    let (start, end) = month_bounds(month_start).ok_or_else(|| "Invalid month key.".to_string())?;
    Ok(build_calendar_payload(
        start,
        end,
        month_roster.as_slice(),
        &records.vacations,
    ))
}

fn load_roster(app: &AppHandle) -> Vec<serde_json::Value> {
    let raw = load_record(app, EMPLOYEES_FILE);
    let roster = normalize_roster_entries(&raw);
    if !raw.is_null() && json!(roster) != raw {
        save_record(app, EMPLOYEES_FILE, &json!(roster));
    }
    roster
}

fn load_monthly(app: &AppHandle) -> serde_json::Map<String, serde_json::Value> {
    let raw = load_record(app, MONTHLY_EMPLOYEES_FILE);
    let monthly = normalize_monthly_value(&raw);
    if !raw.is_null() && serde_json::Value::Object(monthly.clone()) != raw {
        save_record(
            app,
            MONTHLY_EMPLOYEES_FILE,
            &serde_json::Value::Object(monthly.clone()),
        );
    }
    monthly
}

fn load_vacations(
    app: &AppHandle,
    monthly: &serde_json::Map<String, serde_json::Value>,
    roster: &[serde_json::Value],
) -> serde_json::Map<String, serde_json::Value> {
    let raw = load_record(app, VACATIONS_FILE);
    let vacations = normalize_vacations_value(&raw, monthly, roster);
    if !raw.is_null() && serde_json::Value::Object(vacations.clone()) != raw {
        save_record(
            app,
            VACATIONS_FILE,
            &serde_json::Value::Object(vacations.clone()),
        );
    }
    vacations
}

fn load_leave_records(app: &AppHandle) -> LeaveRecords {
    let roster = load_roster(app);
    let monthly = load_monthly(app);
    let vacations = load_vacations(app, &monthly, roster.as_slice());
    LeaveRecords {
        roster,
        monthly,
        vacations,
    }
}

fn ensure_month_roster(
    app: &AppHandle,
    records: &mut LeaveRecords,
    month_start: NaiveDate,
) -> Vec<serde_json::Value> {
    let key = month_key(month_start);
    let (snapshot, created) = roster_for_month(
        &mut records.monthly,
        records.roster.as_slice(),
        key.as_str(),
    );
    if created {
        save_record(
            app,
            MONTHLY_EMPLOYEES_FILE,
            &serde_json::Value::Object(records.monthly.clone()),
        );
    }
    snapshot
}

fn record_cache() -> &'static Mutex<HashMap<String, serde_json::Value>> {
    static CACHE: OnceLock<Mutex<HashMap<String, serde_json::Value>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn load_record(app: &AppHandle, name: &str) -> serde_json::Value {
    if let Ok(cache) = record_cache().lock() {
        if let Some(value) = cache.get(name) {
            return value.clone();
        }
    }
    let value = read_record_from_disk(app, name);
    if let Ok(mut cache) = record_cache().lock() {
        cache.insert(name.to_string(), value.clone());
    }
    value
}

fn read_record_from_disk(app: &AppHandle, name: &str) -> serde_json::Value {
    let root = match storage_root_dir(app) {
        Ok(root) => root,
        Err(err) => {
            log::warn!("storage root unavailable: {err}");
            return serde_json::Value::Null;
        }
    };
    let path = root.join(name);
    if !path.exists() {
        return serde_json::Value::Null;
    }
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(raw.as_str()).unwrap_or_else(|err| {
            log::warn!("discarding unreadable record {name}: {err}");
            serde_json::Value::Null
        }),
        Err(err) => {
            log::warn!("failed to read {name}: {err}");
            serde_json::Value::Null
        }
    }
}

// Writes are best-effort: the cache is updated first, so a failed disk write
// leaves the state live in memory for the rest of the session.
fn save_record(app: &AppHandle, name: &str, value: &serde_json::Value) {
    if let Ok(mut cache) = record_cache().lock() {
        cache.insert(name.to_string(), value.clone());
    }
    let root = match storage_root_dir(app) {
        Ok(root) => root,
        Err(err) => {
            log::warn!("keeping {name} in memory only: {err}");
            return;
        }
    };
    let content = match serde_json::to_string_pretty(value) {
        Ok(content) => content,
        Err(err) => {
            log::warn!("keeping {name} in memory only: {err}");
            return;
        }
    };
    if let Err(err) = write_text_file(root.join(name), content.as_str()) {
        log::warn!("keeping {name} in memory only: {err}");
    }
}

fn load_array(app: &AppHandle, name: &str) -> Vec<serde_json::Value> {
    load_record(app, name)
        .as_array()
        .cloned()
        .unwrap_or_default()
}

fn write_text_file(path: PathBuf, content: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    fs::write(path, content).map_err(|err| err.to_string())?;
    Ok(())
}

fn path_has_storage_data(root: &Path) -> bool {
    storage_root_score(root) > 0
}

fn storage_root_score(root: &Path) -> i64 {
    if !root.exists() {
        return -1;
    }
    let mut score = 0_i64;
    for name in RECORD_FILES {
        let path = root.join(name);
        if !path.is_file() {
            continue;
        }
        score += 20;
        if let Ok(meta) = fs::metadata(path) {
            // Prefer roots that appear to contain real historical data.
            score += ((meta.len() / 1024) as i64).min(2_000);
        }
    }
    score
}

fn legacy_storage_roots(app: &AppHandle) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let mut push_unique = |path: PathBuf| {
        if !roots.iter().any(|existing| existing == &path) {
            roots.push(path);
        }
    };

    if let Ok(documents) = app.path().document_dir() {
        push_unique(documents.join("Mueen"));
    }
    if let Ok(config) = app.path().config_dir() {
        push_unique(config.join("mueen"));
        push_unique(config.join("Mueen"));
    }
    if let Ok(data) = app.path().data_dir() {
        push_unique(data.join("mueen"));
        push_unique(data.join("Mueen"));
    }
    if let Ok(home) = app.path().home_dir() {
        push_unique(home.join("Documents").join("Mueen"));
        push_unique(home.join(".config").join("mueen"));
        push_unique(home.join(".config").join("Mueen"));
        push_unique(home.join(".local").join("share").join("mueen"));
        push_unique(home.join(".local").join("share").join("Mueen"));
        push_unique(
            home.join("Library")
                .join("Application Support")
                .join("Mueen"),
        );
        push_unique(home.join("AppData").join("Roaming").join("Mueen"));
    }

    roots
}

fn storage_root_dir(app: &AppHandle) -> Result<PathBuf, String> {
    static RESOLVED_ROOT: OnceLock<PathBuf> = OnceLock::new();
    if let Some(root) = RESOLVED_ROOT.get() {
        return Ok(root.clone());
    }

    let base = app.path().app_data_dir().map_err(|err| err.to_string())?;
    let default_root = base.join("Mueen");
    fs::create_dir_all(default_root.as_path()).map_err(|err| err.to_string())?;

    let mut resolved = default_root.clone();
    let mut best_score = storage_root_score(default_root.as_path());
    for legacy in legacy_storage_roots(app) {
        if legacy == default_root || !path_has_storage_data(legacy.as_path()) {
            continue;
        }
        let score = storage_root_score(legacy.as_path());
        if score > best_score {
            best_score = score;
            resolved = legacy;
        }
    }

    fs::create_dir_all(resolved.as_path()).map_err(|err| err.to_string())?;
    let _ = RESOLVED_ROOT.set(resolved.clone());
    Ok(resolved)
}

fn sanitize_relative_path(value: &str) -> Result<PathBuf, String> {
    let mut out = PathBuf::new();
    for component in PathBuf::from(value).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err("Invalid storage path.".to_string()),
        }
    }
    if out.as_os_str().is_empty() {
        return Err("Invalid storage path.".to_string());
    }
    Ok(out)
}

fn sanitize_filename(value: &str) -> String {
    let mut out = String::new();
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "mueen-export.csv".to_string()
    } else {
        trimmed.to_string()
    }
}

fn sanitize_export_filename(value: &str) -> String {
    let trimmed = clamp_string(value, 255, true);
    let safe = sanitize_filename(trimmed.as_str());
    if safe.to_lowercase().ends_with(".csv") {
        safe
    } else {
        format!("{safe}.csv")
    }
}

fn should_neutralize_csv(value: &str) -> bool {
    let trimmed = value.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('\'') {
        return false;
    }
    matches!(
        trimmed.chars().next(),
        Some('=') | Some('+') | Some('-') | Some('@')
    )
}

fn neutralize_csv_formula(value: &str) -> String {
    if should_neutralize_csv(value) {
        format!("'{value}")
    } else {
        value.to_string()
    }
}

fn csv_escape(value: &str) -> String {
    let safe = neutralize_csv_formula(value);
    if safe.contains(',') || safe.contains('"') || safe.contains('\n') || safe.contains('\r') {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

fn rows_to_csv(columns: &[String], rows: &[serde_json::Value]) -> String {
    let mut lines: Vec<String> = Vec::new();
    if !columns.is_empty() {
        lines.push(
            columns
                .iter()
                .map(|column| csv_escape(column.as_str()))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    for row in rows {
        let line = columns
            .iter()
            .map(|column| {
                let value = row.as_object().and_then(|obj| obj.get(column));
                csv_escape(value_ref_string(value).as_str())
            })
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    lines.join("\n")
}

fn save_csv_dialog(filename: &str, content: &str) -> Result<SaveCsvResult, String> {
    let path = rfd::FileDialog::new().set_file_name(filename).save_file();

    let Some(path) = path else {
        return Ok(SaveCsvResult {
            ok: false,
            canceled: true,
            filename: filename.to_string(),
            path: None,
            error: None,
        });
    };

    write_text_file(path.clone(), content)?;
    Ok(SaveCsvResult {
        ok: true,
        canceled: false,
        filename: filename.to_string(),
        path: Some(path.to_string_lossy().to_string()),
        error: None,
    })
}

fn main() {
    env_logger::init();
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_clipboard_manager::init())
        .invoke_handler(tauri::generate_handler![
            app_version,
            clipboard_write,
            open_external,
            storage_info,
            storage_read_text,
            storage_write_text,
            storage_read_json,
            storage_write_json,
            users_get,
            user_add,
            user_update,
            user_delete,
            settings_get,
            settings_set,
            tasks_get,
            task_add,
            task_update,
            task_set_category,
            task_delete,
            notes_get,
            note_add,
            note_update,
            note_delete,
            leave_employees_get,
            leave_employees_set,
            leave_calendar_get,
            leave_calendar_prev,
            leave_calendar_next,
            leave_month_update_employee,
            leave_slot_add,
            leave_slot_delete,
            leave_slot_assign,
            leave_slot_move,
            leave_day_reorder,
            leave_export_csv
        ])
        .run(tauri::generate_context!())
        .expect("failed to run Mueen");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn roster(entries: &[(&str, &str, i64)]) -> Vec<serde_json::Value> {
        entries
            .iter()
            .map(|(id, name, allowance)| {
                json!({ "id": id, "name": name, "monthly_leave_allowance": allowance })
            })
            .collect()
    }

    fn day_slots(
        vacations: &serde_json::Map<String, serde_json::Value>,
        key: &str,
    ) -> Vec<serde_json::Value> {
        vacations
            .get(key)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
    }

    fn slot_ids(
        vacations: &serde_json::Map<String, serde_json::Value>,
        key: &str,
    ) -> Vec<String> {
        day_slots(vacations, key)
            .iter()
            .map(|slot| value_ref_string(slot.get("id")))
            .collect()
    }

    #[test]
    fn month_grid_alignment_follows_monday_first_weeks() {
        // June 2024 starts on a Saturday, July 2024 on a Monday.
        assert_eq!(date(2024, 6, 1).weekday().num_days_from_monday(), 5);
        assert_eq!(date(2024, 7, 1).weekday().num_days_from_monday(), 0);
        assert_eq!(date(2024, 2, 1).weekday().num_days_from_monday(), 3);

        let payload = build_calendar_payload(
            date(2024, 6, 1),
            date(2024, 6, 30),
            &[],
            &serde_json::Map::new(),
        );
        assert_eq!(value_i64(payload.get("padding")), 5);
        assert_eq!(payload["days"].as_array().unwrap().len(), 30);
        assert_eq!(value_ref_string(payload.get("month_start")), "2024-06-01");
    }

    #[test]
    fn month_bounds_cover_leap_february() {
        let (start, end) = month_bounds(date(2024, 2, 15)).unwrap();
        assert_eq!(start, date(2024, 2, 1));
        assert_eq!(end, date(2024, 2, 29));
        let (_, end) = month_bounds(date(2023, 2, 1)).unwrap();
        assert_eq!(end, date(2023, 2, 28));
    }

    #[test]
    fn month_navigation_crosses_year_boundaries() {
        assert_eq!(shift_month(date(2024, 1, 1), false), date(2023, 12, 1));
        assert_eq!(shift_month(date(2024, 12, 1), true), date(2025, 1, 1));
    }

    #[test]
    fn next_month_from_any_june_day_lands_on_july_first() {
        let pointer = parse_month_key("2024-06").unwrap();
        let next = shift_month(pointer, true);
        assert_eq!(month_key(next), "2024-07");
        let (start, end) = month_bounds(next).unwrap();
        assert_eq!(start, date(2024, 7, 1));
        assert_eq!(end, date(2024, 7, 31));
        assert_eq!(start.weekday().num_days_from_monday(), 0);
    }

    #[test]
    fn add_slot_caps_each_day_at_two() {
        let mut vacations = serde_json::Map::new();
        assert!(add_slot(&mut vacations, "2024-06-05").is_some());
        assert!(add_slot(&mut vacations, "2024-06-05").is_some());
        assert!(add_slot(&mut vacations, "2024-06-05").is_none());
        assert_eq!(day_slots(&vacations, "2024-06-05").len(), 2);
    }

    #[test]
    fn delete_slot_is_idempotent() {
        let mut vacations = serde_json::Map::new();
        let id = add_slot(&mut vacations, "2024-06-05").unwrap();
        assert!(delete_slot(&mut vacations, "2024-06-05", id.as_str()));
        assert!(!delete_slot(&mut vacations, "2024-06-05", id.as_str()));
        assert!(!delete_slot(&mut vacations, "2024-06-06", "missing"));
        assert!(day_slots(&vacations, "2024-06-05").is_empty());
    }

    #[test]
    fn assign_enforces_monthly_allowance() {
        let month_roster = roster(&[("e1", "Sara", 2)]);
        let mut vacations = serde_json::Map::new();
        let first = add_slot(&mut vacations, "2024-06-01").unwrap();
        let second = add_slot(&mut vacations, "2024-06-02").unwrap();
        let third = add_slot(&mut vacations, "2024-06-03").unwrap();

        assert!(assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 1),
            first.as_str(),
            "e1"
        )
        .is_ok());
        assert!(assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 2),
            second.as_str(),
            "e1"
        )
        .is_ok());
        assert_eq!(
            count_for_employee(&vacations, "e1", date(2024, 6, 1), date(2024, 6, 30)),
            2
        );

        let rejected = assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 3),
            third.as_str(),
            "e1",
        );
        assert!(rejected.is_err());
        assert_eq!(
            value_ref_string(day_slots(&vacations, "2024-06-03")[0].get("employee_id")),
            ""
        );
        assert_eq!(
            count_for_employee(&vacations, "e1", date(2024, 6, 1), date(2024, 6, 30)),
            2
        );
    }

    #[test]
    fn assign_rejects_blank_and_unknown_employees() {
        let month_roster = roster(&[("e1", "Sara", 2), ("e2", "", 1)]);
        let mut vacations = serde_json::Map::new();
        let id = add_slot(&mut vacations, "2024-06-01").unwrap();

        assert!(
            assign_slot(&mut vacations, &month_roster, date(2024, 6, 1), id.as_str(), "").is_err()
        );
        assert!(assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 1),
            id.as_str(),
            "ghost"
        )
        .is_err());
        // Entries with a blank name are placeholders, not assignable employees.
        assert!(assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 1),
            id.as_str(),
            "e2"
        )
        .is_err());
        assert_eq!(
            value_ref_string(day_slots(&vacations, "2024-06-01")[0].get("employee_id")),
            ""
        );
    }

    #[test]
    fn reassign_releases_the_previous_employee() {
        let month_roster = roster(&[("e1", "Sara", 1), ("e2", "Omar", 1)]);
        let mut vacations = serde_json::Map::new();
        let first = add_slot(&mut vacations, "2024-06-01").unwrap();
        let second = add_slot(&mut vacations, "2024-06-02").unwrap();

        assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 1),
            first.as_str(),
            "e1",
        )
        .unwrap();
        // Sara is at cap until her slot is handed to Omar.
        assert!(assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 2),
            second.as_str(),
            "e1"
        )
        .is_err());
        assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 1),
            first.as_str(),
            "e2",
        )
        .unwrap();
        assert!(assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 2),
            second.as_str(),
            "e1"
        )
        .is_ok());
    }

    #[test]
    fn assigning_the_same_employee_again_is_a_noop() {
        let month_roster = roster(&[("e1", "Sara", 1)]);
        let mut vacations = serde_json::Map::new();
        let id = add_slot(&mut vacations, "2024-06-01").unwrap();
        assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 1),
            id.as_str(),
            "e1",
        )
        .unwrap();
        // Re-selecting the current assignee succeeds even at cap.
        assert!(assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 1),
            id.as_str(),
            "e1"
        )
        .is_ok());
        assert_eq!(
            count_for_employee(&vacations, "e1", date(2024, 6, 1), date(2024, 6, 30)),
            1
        );
    }

    #[test]
    fn move_rejects_full_destination_without_partial_state() {
        let mut vacations = serde_json::Map::new();
        add_slot(&mut vacations, "2024-06-10");
        add_slot(&mut vacations, "2024-06-10");
        add_slot(&mut vacations, "2024-06-11");
        add_slot(&mut vacations, "2024-06-11");
        let source_before = slot_ids(&vacations, "2024-06-10");
        let dest_before = slot_ids(&vacations, "2024-06-11");

        let outcome = move_slot(
            &mut vacations,
            "2024-06-10",
            "2024-06-11",
            source_before[0].as_str(),
            None,
        );
        assert!(outcome.is_err());
        assert_eq!(slot_ids(&vacations, "2024-06-10"), source_before);
        assert_eq!(slot_ids(&vacations, "2024-06-11"), dest_before);
    }

    #[test]
    fn move_appends_to_an_open_destination() {
        let mut vacations = serde_json::Map::new();
        let moved = add_slot(&mut vacations, "2024-06-10").unwrap();
        let staying = add_slot(&mut vacations, "2024-06-10").unwrap();
        let existing = add_slot(&mut vacations, "2024-06-11").unwrap();

        move_slot(&mut vacations, "2024-06-10", "2024-06-11", moved.as_str(), None).unwrap();
        assert_eq!(slot_ids(&vacations, "2024-06-10"), vec![staying]);
        assert_eq!(slot_ids(&vacations, "2024-06-11"), vec![existing, moved]);
    }

    #[test]
    fn move_honors_an_explicit_drop_position() {
        let mut vacations = serde_json::Map::new();
        let moved = add_slot(&mut vacations, "2024-06-10").unwrap();
        let existing = add_slot(&mut vacations, "2024-06-11").unwrap();

        move_slot(
            &mut vacations,
            "2024-06-10",
            "2024-06-11",
            moved.as_str(),
            Some(0),
        )
        .unwrap();
        assert_eq!(slot_ids(&vacations, "2024-06-11"), vec![moved, existing]);
    }

    #[test]
    fn same_day_move_reorders_even_at_capacity() {
        let mut vacations = serde_json::Map::new();
        let first = add_slot(&mut vacations, "2024-06-10").unwrap();
        let second = add_slot(&mut vacations, "2024-06-10").unwrap();

        move_slot(
            &mut vacations,
            "2024-06-10",
            "2024-06-10",
            first.as_str(),
            None,
        )
        .unwrap();
        assert_eq!(slot_ids(&vacations, "2024-06-10"), vec![second, first]);
    }

    #[test]
    fn reorder_day_applies_the_requested_order() {
        let mut vacations = serde_json::Map::new();
        let first = add_slot(&mut vacations, "2024-06-10").unwrap();
        let second = add_slot(&mut vacations, "2024-06-10").unwrap();

        let changed = reorder_day(
            &mut vacations,
            "2024-06-10",
            &[second.clone(), "ghost".to_string(), first.clone()],
        );
        assert!(changed);
        assert_eq!(slot_ids(&vacations, "2024-06-10"), vec![second, first]);
        assert!(!reorder_day(&mut vacations, "2024-06-12", &[]));
    }

    #[test]
    fn roster_snapshots_are_isolated_per_month() {
        let global = roster(&[("e1", "Sara", 2)]);
        let mut monthly = serde_json::Map::new();

        let (mut june, created) = roster_for_month(&mut monthly, &global, "2024-06");
        assert!(created);
        update_month_employee(&mut june, "e1", None, Some(5)).unwrap();
        monthly.insert("2024-06".to_string(), json!(june));

        let (july, created) = roster_for_month(&mut monthly, &global, "2024-07");
        assert!(created);
        assert_eq!(value_i64(july[0].get("monthly_leave_allowance")), 2);

        let (june_again, created) = roster_for_month(&mut monthly, &global, "2024-06");
        assert!(!created);
        assert_eq!(value_i64(june_again[0].get("monthly_leave_allowance")), 5);
    }

    #[test]
    fn rename_in_month_keeps_assignments_through_stable_ids() {
        let mut month_roster = roster(&[("e1", "Sara", 2)]);
        let mut vacations = serde_json::Map::new();
        let first = add_slot(&mut vacations, "2024-06-01").unwrap();
        let second = add_slot(&mut vacations, "2024-06-02").unwrap();
        assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 1),
            first.as_str(),
            "e1",
        )
        .unwrap();
        assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 2),
            second.as_str(),
            "e1",
        )
        .unwrap();

        update_month_employee(&mut month_roster, "e1", Some("Sarah"), None).unwrap();

        let payload = build_calendar_payload(
            date(2024, 6, 1),
            date(2024, 6, 30),
            &month_roster,
            &vacations,
        );
        let employees = payload["employees"].as_array().unwrap();
        assert_eq!(value_ref_string(employees[0].get("name")), "Sarah");
        assert_eq!(value_i64(employees[0].get("used")), 2);
        assert!(!employees
            .iter()
            .any(|entry| value_ref_string(entry.get("name")) == "Sara"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut month_roster = roster(&[("e1", "Sara", 2), ("e2", "Omar", 2)]);
        assert!(update_month_employee(&mut month_roster, "e2", Some("Sara"), None).is_err());
        assert_eq!(value_ref_string(month_roster[1].get("name")), "Omar");
        assert!(update_month_employee(&mut month_roster, "ghost", Some("Lina"), None).is_err());

        let entries = roster(&[("e1", "Sara", 2), ("e2", "Sara", 1)]);
        assert_eq!(
            duplicate_employee_name(&entries),
            Some("Sara".to_string())
        );
        let blanks = roster(&[("e1", "", 0), ("e2", "", 0)]);
        assert_eq!(duplicate_employee_name(&blanks), None);
    }

    #[test]
    fn legacy_text_slots_resolve_to_employee_ids() {
        let global = roster(&[("e1", "Sara", 2)]);
        let mut monthly = serde_json::Map::new();
        monthly.insert(
            "2024-06".to_string(),
            json!(roster(&[("e9", "Sara", 2), ("e2", "Omar", 3)])),
        );
        let raw = json!({
            "2024-06-01": [
                { "id": "v1", "text": "Sara" },
                { "id": "v2", "text": "" },
                { "id": "v3", "text": "Omar" },
            ],
            "2024-07-01": [ { "text": "Sara" } ],
            "not-a-date": [ { "id": "v4", "text": "Sara" } ],
        });

        let vacations = normalize_vacations_value(&raw, &monthly, &global);
        let june = day_slots(&vacations, "2024-06-01");
        // The owning month's snapshot wins over the global roster, and the
        // third slot is dropped by the two-per-day cap.
        assert_eq!(june.len(), 2);
        assert_eq!(value_ref_string(june[0].get("employee_id")), "e9");
        assert_eq!(value_ref_string(june[1].get("employee_id")), "");

        let july = day_slots(&vacations, "2024-07-01");
        assert_eq!(value_ref_string(july[0].get("employee_id")), "e1");
        assert!(!value_ref_string(july[0].get("id")).is_empty());
        assert!(!vacations.contains_key("not-a-date"));
    }

    #[test]
    fn unmatched_legacy_names_degrade_to_unassigned() {
        let raw = json!({
            "2024-06-01": [ { "id": "v1", "text": "Nobody" } ],
        });
        let vacations = normalize_vacations_value(&raw, &serde_json::Map::new(), &[]);
        let june = day_slots(&vacations, "2024-06-01");
        assert_eq!(value_ref_string(june[0].get("employee_id")), "");
        assert_eq!(value_ref_string(june[0].get("id")), "v1");
    }

    #[test]
    fn roster_normalization_accepts_legacy_records() {
        let raw = json!([
            { "name": "Sara", "monthlyLeaveAllowance": 3 },
            { "id": "e2", "name": "Omar", "monthly_leave_allowance": -4 },
        ]);
        let entries = normalize_roster_entries(&raw);
        assert!(!value_ref_string(entries[0].get("id")).is_empty());
        assert_eq!(value_i64(entries[0].get("monthly_leave_allowance")), 3);
        assert_eq!(value_ref_string(entries[1].get("id")), "e2");
        assert_eq!(value_i64(entries[1].get("monthly_leave_allowance")), 0);
    }

    #[test]
    fn counts_are_scoped_to_the_month() {
        let month_roster = roster(&[("e1", "Sara", 5)]);
        let mut vacations = serde_json::Map::new();
        for key in ["2024-05-31", "2024-06-01", "2024-06-30", "2024-07-01"] {
            let id = add_slot(&mut vacations, key).unwrap();
            let day = parse_date_key(key).unwrap();
            assign_slot(&mut vacations, &month_roster, day, id.as_str(), "e1").unwrap();
        }
        assert_eq!(
            count_for_employee(&vacations, "e1", date(2024, 6, 1), date(2024, 6, 30)),
            2
        );
        assert_eq!(
            count_for_employee(&vacations, "", date(2024, 6, 1), date(2024, 6, 30)),
            0
        );
    }

    #[test]
    fn calendar_payload_reports_usage_and_add_gating() {
        let month_roster = roster(&[("e1", "Sara", 1)]);
        let mut vacations = serde_json::Map::new();
        let id = add_slot(&mut vacations, "2024-06-03").unwrap();
        assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 3),
            id.as_str(),
            "e1",
        )
        .unwrap();
        add_slot(&mut vacations, "2024-06-04");

        let payload = build_calendar_payload(
            date(2024, 6, 1),
            date(2024, 6, 30),
            &month_roster,
            &vacations,
        );
        let employees = payload["employees"].as_array().unwrap();
        assert_eq!(value_i64(employees[0].get("used")), 1);
        assert_eq!(value_i64(employees[0].get("remaining")), 0);
        // Nobody has allowance left, so the add affordance is disabled.
        assert_eq!(payload["can_add"], json!(false));
        let summary = &payload["summary"];
        assert_eq!(value_i64(summary.get("employees")), 1);
        assert_eq!(value_i64(summary.get("total_allowance")), 1);
        // The unassigned slot still counts as a used day, as the original
        // status cards did.
        assert_eq!(value_i64(summary.get("used")), 2);
        assert_eq!(value_i64(summary.get("remaining")), 0);
    }

    #[test]
    fn leave_csv_lists_both_slots() {
        let month_roster = roster(&[("e1", "Sara", 2), ("e2", "Omar", 2)]);
        let mut vacations = serde_json::Map::new();
        let first = add_slot(&mut vacations, "2024-06-03").unwrap();
        let second = add_slot(&mut vacations, "2024-06-03").unwrap();
        assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 3),
            first.as_str(),
            "e1",
        )
        .unwrap();
        assign_slot(
            &mut vacations,
            &month_roster,
            date(2024, 6, 3),
            second.as_str(),
            "e2",
        )
        .unwrap();

        let csv = build_leave_csv(
            date(2024, 6, 1),
            date(2024, 6, 30),
            &month_roster,
            &vacations,
        );
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date,Weekday,Slot 1,Slot 2");
        assert_eq!(lines.len(), 31);
        assert_eq!(lines[3], "2024-06-03,Monday,Sara,Omar");
        assert_eq!(lines[4], "2024-06-04,Tuesday,,");
    }

    #[test]
    fn csv_escaping_covers_quotes_commas_and_formulas() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(sanitize_export_filename("june report"), "june_report.csv");
    }

    #[test]
    fn task_categories_map_to_priority_colors() {
        assert_eq!(category_color("urgent_important"), "bg-priority-urgent");
        assert_eq!(category_color("urgent_not_important"), "bg-priority-high");
        assert_eq!(category_color("not_urgent_important"), "bg-priority-medium");
        assert_eq!(
            category_color("not_urgent_not_important"),
            "bg-priority-low"
        );
        assert_eq!(category_color("bogus"), "bg-priority-low");
    }

    #[test]
    fn invalid_choices_fall_back() {
        assert_eq!(
            sanitize_choice(Some(&json!("in_progress")), &TASK_STATUSES, "todo"),
            "in_progress"
        );
        assert_eq!(
            sanitize_choice(Some(&json!("paused")), &TASK_STATUSES, "todo"),
            "todo"
        );
        assert_eq!(valid_choice(Some(&json!("ar")), &LANGUAGES), Some("ar".to_string()));
        assert_eq!(valid_choice(Some(&json!("fr")), &LANGUAGES), None);
        assert_eq!(valid_choice(None, &THEMES), None);
    }

    #[test]
    fn permissions_are_validated_and_deduped() {
        let raw = json!(["view_tools", "hack_everything", "view_tools", "manage_users"]);
        assert_eq!(
            sanitize_permissions(Some(&raw)),
            vec!["view_tools".to_string(), "manage_users".to_string()]
        );
        assert!(sanitize_permissions(None).is_empty());
        assert_eq!(all_permissions().len(), PERMISSIONS.len());
    }

    #[test]
    fn date_keys_round_trip() {
        assert_eq!(parse_month_key("2024-06"), Some(date(2024, 6, 1)));
        assert_eq!(parse_month_key("junk"), None);
        assert_eq!(parse_date_key("2024-06-05"), Some(date(2024, 6, 5)));
        assert_eq!(parse_date_key("2024-13-05"), None);
        assert_eq!(month_key(date(2024, 6, 17)), "2024-06");
        assert_eq!(date_key(date(2024, 6, 5)), "2024-06-05");
        assert_eq!(first_of_month(date(2024, 6, 17)), date(2024, 6, 1));
    }
}
