//! Emits the generated parser: a C++ header/source pair specialized to one
//! message type. Output is assembled as a vector of lines and joined, so
//! the same graph always produces byte-identical text.

use crate::descriptor::{DescriptorPool, FieldKind};
use crate::graph::{Graph, Node, NodeId, NodeKind};
use crate::hash::key_hash;

/// `some.ns.Point` → `::some::ns::Point`
fn cpp_type_name(full_name: &str) -> String {
    format!("::{}", full_name.replace('.', "::"))
}

fn namespaces(pool: &DescriptorPool) -> Vec<&str> {
    pool.package
        .as_deref()
        .map(|package| package.split('.').collect())
        .unwrap_or_default()
}

fn push_namespace_begin(out: &mut Vec<String>, pool: &DescriptorPool) {
    for ns in namespaces(pool) {
        out.push(format!("namespace {} {{", ns));
    }
    out.push(String::new());
}

fn push_namespace_end(out: &mut Vec<String>, pool: &DescriptorPool) {
    for ns in namespaces(pool).iter().rev() {
        out.push(format!("}} // namespace {}", ns));
    }
}

fn parent_state(graph: &Graph, node: &Node) -> usize {
    let parent = node.parent.expect("only the root node has no parent");
    graph.node(parent).state
}

/// The accessor prefix for value writes: repeated fields append, singular
/// fields overwrite.
fn value_verb(pool: &DescriptorPool, node: &Node) -> &'static str {
    if is_repeated(pool, node) {
        "add"
    } else {
        "set"
    }
}

/// The accessor prefix for obtaining a mutable child (strings and
/// submessages).
fn mutable_verb(pool: &DescriptorPool, node: &Node) -> &'static str {
    if is_repeated(pool, node) {
        "add"
    } else {
        "mutable"
    }
}

fn is_repeated(pool: &DescriptorPool, node: &Node) -> bool {
    node.field_in(pool).map_or(false, |f| f.is_repeated())
}

/// The cast applied to the top of the message stack before calling one of
/// `node`'s accessors.
fn stack_top(pool: &DescriptorPool, node: &Node) -> String {
    let cpp_type = cpp_type_name(&pool.message(node.message).full_name);
    format!("static_cast<{} *>(state.msgStack.back())", cpp_type)
}

pub fn emit_header(pool: &DescriptorPool, graph: &Graph, proto_header: &str) -> String {
    let desc = pool.message(graph.target);
    let t = desc.name.to_lowercase();
    let c = cpp_type_name(&desc.full_name);
    let mut out: Vec<String> = Vec::new();

    out.push("#pragma once".to_string());
    out.push(String::new());
    out.push(format!("#include \"{}\"", proto_header));
    out.push(String::new());
    push_namespace_begin(&mut out, pool);
    out.push(format!(
        "typedef struct {t}_parser_state_s *{t}_parser_state_t;"
    ));
    out.push(String::new());
    out.push(format!("{c} {t}_parser_easy(const std::string &json);"));
    out.push(String::new());
    out.push(format!("{t}_parser_state_t {t}_parser_init({c} &msg);"));
    out.push(format!("void {t}_parser_free({t}_parser_state_t state);"));
    out.push(format!(
        "int {t}_parser_on_chunk({t}_parser_state_t state, char *chunk, size_t chunkLen);"
    ));
    out.push(format!("int {t}_parser_complete({t}_parser_state_t state);"));
    out.push(format!("int {t}_parser_reset({t}_parser_state_t state);"));
    out.push(format!(
        "char *{t}_parser_get_error({t}_parser_state_t state);"
    ));
    out.push(format!(
        "char *{t}_parser_get_error({t}_parser_state_t state, int verbose, const char *chunk, size_t chunkLen);"
    ));
    out.push(format!(
        "void {t}_parser_free_error({t}_parser_state_t state, char *err);"
    ));
    out.push(String::new());
    push_namespace_end(&mut out, pool);

    out.join("\n") + "\n"
}

pub fn emit_source(pool: &DescriptorPool, graph: &Graph) -> String {
    let desc = pool.message(graph.target);
    let t = desc.name.to_lowercase();
    let c = cpp_type_name(&desc.full_name);
    let mut out: Vec<String> = Vec::new();

    push_includes(&mut out, &t);
    push_namespace_begin(&mut out, pool);
    push_state_definition(&mut out, &t, &c);
    out.push("namespace {".to_string());
    out.push(String::new());
    push_key_hash(&mut out, &t);
    push_copy_error(&mut out, &t);
    push_null_handler(&mut out, pool, graph, &t);
    push_scalar_handler(&mut out, pool, graph, &t, "boolean", "int", &graph.index.bools);
    push_scalar_handler(
        &mut out,
        pool,
        graph,
        &t,
        "integer",
        "long long",
        &graph.index.longs,
    );
    push_scalar_handler(
        &mut out,
        pool,
        graph,
        &t,
        "double",
        "double",
        &graph.index.doubles,
    );
    push_string_handler(&mut out, pool, graph, &t);
    push_map_start_handler(&mut out, pool, graph, &t);
    push_map_key_handler(&mut out, graph, &t);
    push_map_end_handler(&mut out, graph, &t);
    push_array_start_handler(&mut out, graph, &t);
    push_array_end_handler(&mut out, graph, &t);
    push_callbacks(&mut out, &t);
    out.push("} // anonymous namespace".to_string());
    out.push(String::new());
    push_api(&mut out, &t, &c);
    push_namespace_end(&mut out, pool);

    out.join("\n") + "\n"
}

fn push_includes(out: &mut Vec<String>, t: &str) {
    out.push(format!("#include \"{t}_parser.pb.h\""));
    out.push(String::new());
    out.push("#include <assert.h>".to_string());
    out.push("#include <stdint.h>".to_string());
    out.push("#include <stdlib.h>".to_string());
    out.push("#include <string.h>".to_string());
    out.push(String::new());
    out.push("#include <stdexcept>".to_string());
    out.push("#include <string>".to_string());
    out.push("#include <vector>".to_string());
    out.push(String::new());
    out.push("#include <yajl/yajl_parse.h>".to_string());
    out.push(String::new());
}

fn push_state_definition(out: &mut Vec<String>, t: &str, c: &str) {
    out.push(format!("struct {t}_parser_config_s {{"));
    out.push("    bool checkInitialized;".to_string());
    out.push("};".to_string());
    out.push(String::new());
    out.push(format!("struct {t}_parser_state_s {{"));
    out.push(format!("    {t}_parser_state_s({c} &msg) : msg(msg) {{ }}"));
    out.push(String::new());
    out.push(format!("    {t}_parser_config_s config;"));
    out.push("    yajl_handle handle = NULL;".to_string());
    out.push("    size_t location = 0;".to_string());
    out.push("    int failed = 0;".to_string());
    out.push("    std::string error;".to_string());
    out.push(format!("    {c} &msg;"));
    out.push("    std::vector<::google::protobuf::Message *> msgStack;".to_string());
    out.push(String::new());
    out.push("    void fail(const std::string &reason) {".to_string());
    out.push("        failed = 1;".to_string());
    out.push("        error = reason;".to_string());
    out.push("    }".to_string());
    out.push(String::new());
    out.push("    void reset() {".to_string());
    out.push("        location = 0;".to_string());
    out.push("        failed = 0;".to_string());
    out.push("        error.clear();".to_string());
    out.push("        msg.Clear();".to_string());
    out.push("        msgStack.clear();".to_string());
    out.push("    }".to_string());
    out.push("};".to_string());
    out.push(String::new());
}

fn push_key_hash(out: &mut Vec<String>, t: &str) {
    out.push(format!(
        "static uint32_t {t}_parser_impl_key_hash(const unsigned char *data, size_t len) {{"
    ));
    out.push("    uint32_t hash = 2166136261u;".to_string());
    out.push("    for (size_t i = 0; i < len; ++i) {".to_string());
    out.push("        hash ^= static_cast<uint32_t>(data[i]);".to_string());
    out.push("        hash *= 16777619u;".to_string());
    out.push("    }".to_string());
    out.push("    return hash;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_copy_error(out: &mut Vec<String>, t: &str) {
    out.push(format!(
        "static char *{t}_parser_impl_copy_error(const char *msg) {{"
    ));
    out.push("    const size_t len = strlen(msg);".to_string());
    out.push("    char *buf = static_cast<char *>(malloc(len + 1));".to_string());
    out.push("    memcpy(buf, msg, len + 1);".to_string());
    out.push("    return buf;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_default_case(out: &mut Vec<String>, what: &str) {
    out.push("        default:".to_string());
    out.push(format!(
        "            state.fail(\"state \" + std::to_string(state.location) + \" does not allow {what}\");"
    ));
    out.push("            return 0;".to_string());
}

fn push_handler_prologue(out: &mut Vec<String>, t: &str, name: &str, args: &str) {
    out.push(format!("static int {t}_parser_impl_parse_{name}(void *ctx{args}) {{"));
    out.push(format!(
        "    {t}_parser_state_s &state = *static_cast<{t}_parser_state_t>(ctx);"
    ));
}

fn push_null_handler(out: &mut Vec<String>, pool: &DescriptorPool, graph: &Graph, t: &str) {
    push_handler_prologue(out, t, "null", "");
    out.push("    switch (state.location) {".to_string());
    for &id in &graph.index.nullable {
        let node = graph.node(id);
        out.push(format!("        case {}: // key {}", node.state, node.full_name));
        out.push(format!(
            "            {}->clear_{}();",
            stack_top(pool, node),
            node.name
        ));
        out.push(format!(
            "            state.location = {};",
            parent_state(graph, node)
        ));
        out.push("            break;".to_string());
    }
    push_default_case(out, "null");
    out.push("    }".to_string());
    out.push("    return 1;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_scalar_handler(
    out: &mut Vec<String>,
    pool: &DescriptorPool,
    graph: &Graph,
    t: &str,
    event: &str,
    arg_type: &str,
    nodes: &[NodeId],
) {
    push_handler_prologue(out, t, event, &format!(", {arg_type} v"));
    out.push("    switch (state.location) {".to_string());
    for &id in nodes {
        let node = graph.node(id);
        let field = node
            .field_in(pool)
            .expect("scalar states always carry a field");
        let value = match &field.kind {
            FieldKind::Enum(enum_id) => format!(
                "static_cast<{}>(v)",
                cpp_type_name(&pool.enum_desc(*enum_id).full_name)
            ),
            _ => "v".to_string(),
        };
        out.push(format!("        case {}: // key {}", node.state, node.full_name));
        out.push(format!(
            "            {}->{}_{}({});",
            stack_top(pool, node),
            value_verb(pool, node),
            node.name,
            value
        ));
        if !field.is_repeated() {
            // For array elements the closing bracket restores the location.
            out.push(format!(
                "            state.location = {};",
                parent_state(graph, node)
            ));
        }
        out.push("            break;".to_string());
    }
    push_default_case(out, event);
    out.push("    }".to_string());
    out.push("    return 1;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_string_handler(out: &mut Vec<String>, pool: &DescriptorPool, graph: &Graph, t: &str) {
    push_handler_prologue(out, t, "string", ", const unsigned char *v, size_t vLen");
    out.push("    std::string *target = NULL;".to_string());
    out.push("    switch (state.location) {".to_string());
    for &id in &graph.index.strings {
        let node = graph.node(id);
        out.push(format!("        case {}: // key {}", node.state, node.full_name));
        out.push(format!(
            "            target = {}->{}_{}();",
            stack_top(pool, node),
            mutable_verb(pool, node),
            node.name
        ));
        if !is_repeated(pool, node) {
            out.push(format!(
                "            state.location = {};",
                parent_state(graph, node)
            ));
        }
        out.push("            break;".to_string());
    }
    push_default_case(out, "string");
    out.push("    }".to_string());
    out.push("    if (target != NULL) {".to_string());
    out.push("        target->assign(reinterpret_cast<const char *>(v), vLen);".to_string());
    out.push("    }".to_string());
    out.push("    return 1;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_map_start_handler(out: &mut Vec<String>, pool: &DescriptorPool, graph: &Graph, t: &str) {
    push_handler_prologue(out, t, "start_map", "");
    out.push("    switch (state.location) {".to_string());
    for &id in &graph.index.objects {
        let node = graph.node(id);
        match node.parent {
            None => {
                // Document start: state 0 is the only place the target
                // message itself enters the stack.
                out.push("        case 0: // map .".to_string());
                out.push(format!("            state.location = {};", node.state));
                out.push("            assert(state.msgStack.empty());".to_string());
                out.push("            state.msgStack.push_back(&state.msg);".to_string());
                out.push("            break;".to_string());
            }
            Some(parent) => {
                out.push(format!(
                    "        case {}: // map {}",
                    graph.node(parent).state,
                    node.full_name
                ));
                out.push(format!("            state.location = {};", node.state));
                out.push(format!(
                    "            state.msgStack.push_back({}->{}_{}());",
                    stack_top(pool, node),
                    mutable_verb(pool, node),
                    node.name
                ));
                out.push("            break;".to_string());
            }
        }
    }
    push_default_case(out, "an object");
    out.push("    }".to_string());
    out.push("    return 1;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_map_key_handler(out: &mut Vec<String>, graph: &Graph, t: &str) {
    push_handler_prologue(out, t, "map_key", ", const unsigned char *key_, size_t keyLen");
    out.push("    const std::string key(reinterpret_cast<const char *>(key_), keyLen);".to_string());
    out.push(format!(
        "    const uint32_t hash = {t}_parser_impl_key_hash(key_, keyLen);"
    ));
    out.push("    switch (state.location) {".to_string());
    for &id in &graph.index.objects {
        let node = graph.node(id);
        out.push(format!("        case {}: // map {}", node.state, node.full_name));
        out.push("            switch (hash) {".to_string());
        for &child_id in &node.children {
            let child = graph.node(child_id);
            out.push(format!(
                "                case {}u: // {}",
                key_hash(&child.name),
                child.name
            ));
            out.push(format!(
                "                    state.location = {};",
                child.state
            ));
            out.push("                    break;".to_string());
        }
        out.push("                default:".to_string());
        out.push(format!(
            "                    state.fail(\"invalid key \\\"\" + key + \"\\\" for {}\");",
            node.full_name
        ));
        out.push("                    return 0;".to_string());
        out.push("            }".to_string());
        out.push("            break;".to_string());
    }
    push_default_case(out, "a key");
    out.push("    }".to_string());
    out.push("    return 1;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_map_end_handler(out: &mut Vec<String>, graph: &Graph, t: &str) {
    push_handler_prologue(out, t, "end_map", "");
    out.push("    if (state.config.checkInitialized) {".to_string());
    out.push("        state.msgStack.back()->CheckInitialized();".to_string());
    out.push("    }".to_string());
    out.push("    switch (state.location) {".to_string());
    for &id in &graph.index.objects {
        let node = graph.node(id);
        match node.parent {
            None => {
                out.push(format!("        case {}: // map .", node.state));
                out.push("            state.location = 0;".to_string());
                out.push("            state.msgStack.pop_back();".to_string());
                out.push("            assert(state.msgStack.empty());".to_string());
                out.push("            break;".to_string());
            }
            Some(parent_id) => {
                // The parent is the KeyOfMessage state. For a repeated
                // message the location returns there, so the next `{` in
                // the array can re-enter this object; otherwise it returns
                // to the enclosing object.
                let parent = graph.node(parent_id);
                let grandparent_id = parent.parent.expect("key nodes always have a parent");
                let grandparent = graph.node(grandparent_id);
                let next = if grandparent.kind == NodeKind::Array {
                    parent.state
                } else {
                    grandparent.state
                };
                out.push(format!("        case {}: // map {}", node.state, node.full_name));
                out.push(format!("            state.location = {};", next));
                out.push("            state.msgStack.pop_back();".to_string());
                out.push("            break;".to_string());
            }
        }
    }
    push_default_case(out, "closing an object");
    out.push("    }".to_string());
    out.push("    return 1;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_array_start_handler(out: &mut Vec<String>, graph: &Graph, t: &str) {
    push_handler_prologue(out, t, "start_array", "");
    out.push("    switch (state.location) {".to_string());
    for &id in &graph.index.arrays {
        let node = graph.node(id);
        assert_eq!(node.children.len(), 1);
        out.push(format!("        case {}: // key {}", node.state, node.full_name));
        out.push(format!(
            "            state.location = {};",
            graph.node(node.children[0]).state
        ));
        out.push("            break;".to_string());
    }
    push_default_case(out, "an array");
    out.push("    }".to_string());
    out.push("    return 1;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_array_end_handler(out: &mut Vec<String>, graph: &Graph, t: &str) {
    push_handler_prologue(out, t, "end_array", "");
    out.push("    switch (state.location) {".to_string());
    for &id in &graph.index.arrays {
        let node = graph.node(id);
        assert_eq!(node.children.len(), 1);
        // Between elements the location rests on the element state, so the
        // closing bracket dispatches on it and returns to the enclosing
        // object.
        out.push(format!(
            "        case {}: // key {}",
            graph.node(node.children[0]).state,
            node.full_name
        ));
        out.push(format!(
            "            state.location = {};",
            parent_state(graph, node)
        ));
        out.push("            break;".to_string());
    }
    push_default_case(out, "closing an array");
    out.push("    }".to_string());
    out.push("    return 1;".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

fn push_callbacks(out: &mut Vec<String>, t: &str) {
    out.push(format!("static yajl_callbacks {t}_parser_impl_callbacks = {{"));
    out.push(format!("        {t}_parser_impl_parse_null,"));
    out.push(format!("        {t}_parser_impl_parse_boolean,"));
    out.push(format!("        {t}_parser_impl_parse_integer,"));
    out.push(format!("        {t}_parser_impl_parse_double,"));
    out.push("        NULL, // number".to_string());
    out.push(format!("        {t}_parser_impl_parse_string,"));
    out.push(format!("        {t}_parser_impl_parse_start_map,"));
    out.push(format!("        {t}_parser_impl_parse_map_key,"));
    out.push(format!("        {t}_parser_impl_parse_end_map,"));
    out.push(format!("        {t}_parser_impl_parse_start_array,"));
    out.push(format!("        {t}_parser_impl_parse_end_array,"));
    out.push("};".to_string());
    out.push(String::new());
}

fn push_api(out: &mut Vec<String>, t: &str, c: &str) {
    out.push(format!("{c} {t}_parser_easy(const std::string &json) {{"));
    out.push(format!("    {c} msg;"));
    out.push(format!("    {t}_parser_state_t state = {t}_parser_init(msg);"));
    out.push(String::new());
    out.push(format!(
        "    int rc = {t}_parser_on_chunk(state, const_cast<char *>(json.c_str()), json.size());"
    ));
    out.push("    if (rc == 0) {".to_string());
    out.push(format!("        rc = {t}_parser_complete(state);"));
    out.push("    }".to_string());
    out.push("    if (rc != 0) {".to_string());
    out.push(format!("        char *err = {t}_parser_get_error(state);"));
    out.push("        const std::string reason = err ? err : \"unknown parse error\";".to_string());
    out.push(format!("        {t}_parser_free_error(state, err);"));
    out.push(format!("        {t}_parser_free(state);"));
    out.push("        throw std::runtime_error(reason);".to_string());
    out.push("    }".to_string());
    out.push(String::new());
    out.push(format!("    {t}_parser_free(state);"));
    out.push(String::new());
    out.push("    return msg;".to_string());
    out.push("}".to_string());
    out.push(String::new());

    out.push(format!("{t}_parser_state_t {t}_parser_init({c} &msg) {{"));
    out.push(format!(
        "    {t}_parser_state_t state = new {t}_parser_state_s(msg);"
    ));
    out.push("    state->config.checkInitialized = true;".to_string());
    out.push(String::new());
    out.push(format!(
        "    yajl_handle handle = yajl_alloc(&{t}_parser_impl_callbacks, NULL, state);"
    ));
    out.push("    yajl_config(handle, yajl_allow_comments, 0);".to_string());
    out.push("    yajl_config(handle, yajl_dont_validate_strings, 0);".to_string());
    out.push("    yajl_config(handle, yajl_allow_trailing_garbage, 0);".to_string());
    out.push("    yajl_config(handle, yajl_allow_multiple_values, 0);".to_string());
    out.push("    yajl_config(handle, yajl_allow_partial_values, 0);".to_string());
    out.push("    state->handle = handle;".to_string());
    out.push(String::new());
    out.push("    return state;".to_string());
    out.push("}".to_string());
    out.push(String::new());

    out.push(format!("void {t}_parser_free({t}_parser_state_t state) {{"));
    out.push("    assert(state);".to_string());
    out.push("    if (state) {".to_string());
    out.push("        if (state->handle) {".to_string());
    out.push("            yajl_free(state->handle);".to_string());
    out.push("        }".to_string());
    out.push("        delete state;".to_string());
    out.push("    }".to_string());
    out.push("}".to_string());
    out.push(String::new());

    out.push(format!(
        "int {t}_parser_on_chunk({t}_parser_state_t state, char *chunk, size_t chunkLen) {{"
    ));
    out.push("    assert(state);".to_string());
    out.push("    assert(state->handle);".to_string());
    out.push(
        "    const unsigned char *uChunk = reinterpret_cast<const unsigned char *>(chunk);"
            .to_string(),
    );
    out.push("    const yajl_status stat = yajl_parse(state->handle, uChunk, chunkLen);".to_string());
    out.push("    return state->failed || stat != yajl_status_ok;".to_string());
    out.push("}".to_string());
    out.push(String::new());

    out.push(format!("int {t}_parser_complete({t}_parser_state_t state) {{"));
    out.push("    assert(state);".to_string());
    out.push("    assert(state->handle);".to_string());
    out.push("    const yajl_status stat = yajl_complete_parse(state->handle);".to_string());
    out.push("    return state->failed || stat != yajl_status_ok;".to_string());
    out.push("}".to_string());
    out.push(String::new());

    out.push(format!("int {t}_parser_reset({t}_parser_state_t state) {{"));
    out.push("    assert(state);".to_string());
    out.push("    if (state) {".to_string());
    out.push("        state->reset();".to_string());
    out.push("    }".to_string());
    out.push("    return 0;".to_string());
    out.push("}".to_string());
    out.push(String::new());

    out.push(format!("char *{t}_parser_get_error({t}_parser_state_t state) {{"));
    out.push(format!("    return {t}_parser_get_error(state, 0, 0, 0);"));
    out.push("}".to_string());
    out.push(String::new());

    out.push(format!(
        "char *{t}_parser_get_error({t}_parser_state_t state, int verbose, const char *chunk, size_t chunkLen) {{"
    ));
    out.push("    assert(state);".to_string());
    out.push("    assert(state->handle);".to_string());
    out.push("    if (state->failed) {".to_string());
    out.push(format!(
        "        return {t}_parser_impl_copy_error(state->error.c_str());"
    ));
    out.push("    }".to_string());
    out.push(
        "    const unsigned char *uChunk = reinterpret_cast<const unsigned char *>(chunk);"
            .to_string(),
    );
    out.push(
        "    unsigned char *err = yajl_get_error(state->handle, verbose, uChunk, chunkLen);"
            .to_string(),
    );
    out.push(format!(
        "    char *copy = {t}_parser_impl_copy_error(reinterpret_cast<const char *>(err));"
    ));
    out.push("    yajl_free_error(state->handle, err);".to_string());
    out.push("    return copy;".to_string());
    out.push("}".to_string());
    out.push(String::new());

    out.push(format!(
        "void {t}_parser_free_error({t}_parser_state_t state, char *err) {{"
    ));
    out.push("    (void)state;".to_string());
    out.push("    free(err);".to_string());
    out.push("}".to_string());
    out.push(String::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::pool_from_source;

    fn emit(file_name: &str, input: &str, message: &str) -> (String, String) {
        let pool = pool_from_source(file_name, input);
        let id = pool.message_by_name(message).expect("message not found");
        let graph = Graph::build(&pool, id).expect("graph build failed");
        (
            emit_header(&pool, &graph, "point.pb.h"),
            emit_source(&pool, &graph),
        )
    }

    fn emit_point(file_name: &str) -> (String, String) {
        let source = r#"
            syntax = "proto2";
            package some.ns;
            message Point {
                optional int32 x = 1;
                optional bool flag = 2;
            }
        "#;
        emit(file_name, source, "some.ns.Point")
    }

    #[test]
    fn test_header_declares_the_public_surface() {
        let (header, _) = emit_point("gen_header.proto");

        assert!(header.starts_with("#pragma once"));
        assert!(header.contains("#include \"point.pb.h\""));
        assert!(header.contains("namespace some {"));
        assert!(header.contains("namespace ns {"));
        assert!(header.contains("typedef struct point_parser_state_s *point_parser_state_t;"));
        assert!(header.contains("::some::ns::Point point_parser_easy(const std::string &json);"));
        assert!(header.contains(
            "int point_parser_on_chunk(point_parser_state_t state, char *chunk, size_t chunkLen);"
        ));
        assert!(header.contains("} // namespace ns"));
    }

    /// The emitted body of one handler, from its signature to the closing
    /// brace at column zero.
    fn handler_body<'a>(source: &'a str, name: &str) -> &'a str {
        let needle = format!("_parser_impl_parse_{}(void", name);
        let start = source.find(&needle).expect("handler not emitted");
        let end = start + source[start..].find("\n}\n").expect("handler has no end");
        &source[start..end]
    }

    #[test]
    fn test_source_wires_setters_and_transitions() {
        let (_, source) = emit_point("gen_setters.proto");

        // x is state 2, flag state 3; both return to the root state 1.
        assert!(source
            .contains("static_cast<::some::ns::Point *>(state.msgStack.back())->set_x(v);"));
        assert!(handler_body(&source, "integer").contains("case 2: // key .x"));
        // Document start pushes the target message.
        assert!(source.contains("case 0: // map ."));
        assert!(source.contains("state.msgStack.push_back(&state.msg);"));
    }

    #[test]
    fn test_widened_states_reach_both_dispatchers() {
        let (_, source) = emit_point("gen_widened.proto");

        // The bool state is dispatched by the boolean and integer handlers.
        assert!(handler_body(&source, "boolean").contains("case 3: // key .flag"));
        assert!(handler_body(&source, "integer").contains("case 3: // key .flag"));
        assert!(!handler_body(&source, "double").contains("case 3: // key .flag"));
        // Optional scalars are also null sites.
        assert!(handler_body(&source, "null").contains("case 2: // key .x"));
    }

    #[test]
    fn test_map_key_switch_uses_fnv_hashes() {
        let (_, source) = emit_point("gen_hashes.proto");
        let body = handler_body(&source, "map_key");
        assert!(body.contains(&format!("case {}u: // x", key_hash("x"))));
        assert!(body.contains(&format!("case {}u: // flag", key_hash("flag"))));
        assert!(source.contains("uint32_t hash = 2166136261u;"));
    }

    #[test]
    fn test_failures_do_not_exit() {
        let (_, source) = emit_point("gen_failures.proto");
        assert!(!source.contains("exit(1)"));
        assert!(source.contains("state.fail("));
        assert!(source.contains("return state->failed || stat != yajl_status_ok;"));
    }

    #[test]
    fn test_repeated_message_round_trip_states() {
        let (_, source) = emit(
            "gen_repeated_message.proto",
            r#"
            syntax = "proto2";
            message Point { optional int32 x = 1; }
            message Poly { repeated Point pts = 1; }
            "#,
            "Poly",
        );

        // States: root=1, array=2, key=3, object=4, x=5.
        // `{` inside the array re-enters the object from the key state.
        assert!(source.contains("case 3: // map .pts[]."));
        // `}` returns to the key state because the grandparent is the array.
        assert!(source.contains("case 4: // map .pts[]."));
        let end_map_return = "            state.location = 3;";
        assert!(source.contains(end_map_return));
        // `]` dispatches on the key state and returns to the root.
        assert!(source.contains("case 3: // key .pts"));
    }

    #[test]
    fn test_enum_values_are_cast() {
        let (_, source) = emit(
            "gen_enum_cast.proto",
            r#"
            syntax = "proto2";
            package demo;
            enum Mode { MODE_OFF = 0; MODE_ON = 1; }
            message M { optional Mode mode = 1; }
            "#,
            "demo.M",
        );
        assert!(source.contains("->set_mode(static_cast<::demo::Mode>(v));"));
    }

    #[test]
    fn test_emission_is_deterministic() {
        let (header_a, source_a) = emit_point("gen_deterministic.proto");
        let (header_b, source_b) = emit_point("gen_deterministic.proto");
        assert_eq!(header_a, header_b);
        assert_eq!(source_a, source_b);
    }
}
