//! The JNI environment function table handed to native code. The entries the
//! runtime needs are implemented against the VM; everything else is a stub
//! that fails loudly rather than silently. The C-variadic call variants
//! cannot be expressed on stable Rust and are absent from the table; native
//! code is expected to use the `A`/`V` forms, which are stubbed.
#![allow(non_snake_case)]

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr::null_mut;
use std::sync::Arc;

use jni::sys::{
    jarray, jboolean, jbyte, jchar, jclass, jdouble, jfieldID, jfloat, jint, jlong, jmethodID,
    jobject, jobjectArray, jobjectRefType, jshort, jsize, jstring, jthrowable, jvalue, jweak,
    va_list, JNIEnv, JNINativeInterface_, JNINativeMethod, JavaVM, JNI_ERR, JNI_FALSE, JNI_OK,
    JNI_TRUE,
};

use crate::jvm::mem::{object_eq, ObjectRef};
use crate::jvm::Vm;

const JNI_VERSION_1_6: jint = 0x0001_0006;

unsafe fn vm_of<'a>(env: *mut JNIEnv) -> &'a Arc<Vm> {
    &*((**env).reserved0 as *const Arc<Vm>)
}

unsafe fn object_of(env: *mut JNIEnv, handle: jobject) -> Option<ObjectRef> {
    vm_of(env).handles.resolve(handle as usize)
}

unsafe extern "system" fn get_version(_env: *mut JNIEnv) -> jint {
    JNI_VERSION_1_6
}

unsafe extern "system" fn find_class(env: *mut JNIEnv, name: *const c_char) -> jclass {
    let vm = vm_of(env);
    let requested = match CStr::from_ptr(name).to_str() {
        Ok(text) => text.replace('/', "."),
        Err(_) => return null_mut(),
    };

    match vm.registry.get_or_load(&requested) {
        Ok(class) => {
            let mirror = vm.class_mirror(class.fullname());
            vm.handles.to_token(&mirror) as jclass
        }
        Err(err) => {
            error!("FindClass {}: {}", requested, err);
            null_mut()
        }
    }
}

unsafe extern "system" fn throw(env: *mut JNIEnv, obj: jthrowable) -> jint {
    let vm = vm_of(env);
    match object_of(env, obj) {
        Some(thrown) => {
            vm.set_sticky_exception(thrown);
            JNI_OK
        }
        None => JNI_ERR,
    }
}

unsafe extern "system" fn throw_new(env: *mut JNIEnv, clazz: jclass, msg: *const c_char) -> jint {
    let vm = vm_of(env);
    let class_name = match object_of(env, clazz).as_ref().and_then(|m| {
        m.mirror_target().map(|t| t.to_string())
    }) {
        Some(name) => name,
        None => return JNI_ERR,
    };

    let message = if msg.is_null() {
        String::new()
    } else {
        CStr::from_ptr(msg).to_string_lossy().into_owned()
    };

    let thrown = vm.exception_object(&class_name, &message);
    vm.set_sticky_exception(thrown);
    JNI_OK
}

unsafe extern "system" fn exception_occurred(env: *mut JNIEnv) -> jthrowable {
    let vm = vm_of(env);
    match vm.sticky_exception() {
        Some(thrown) => vm.handles.to_token(&thrown) as jthrowable,
        None => null_mut(),
    }
}

unsafe extern "system" fn exception_describe(env: *mut JNIEnv) {
    let vm = vm_of(env);
    if let Some(thrown) = vm.sticky_exception() {
        let class = thrown.class_name().unwrap_or_default();
        vm.write_err(&format!("pending exception: {}\n", class));
    }
}

unsafe extern "system" fn exception_clear(env: *mut JNIEnv) {
    let _ = vm_of(env).take_sticky_exception();
}

unsafe extern "system" fn exception_check(env: *mut JNIEnv) -> jboolean {
    vm_of(env).has_sticky_exception() as jboolean
}

unsafe extern "system" fn new_global_ref(env: *mut JNIEnv, lobj: jobject) -> jobject {
    match vm_of(env).handles.promote(lobj as usize) {
        Some(token) => token as jobject,
        None => null_mut(),
    }
}

unsafe extern "system" fn delete_global_ref(env: *mut JNIEnv, gref: jobject) {
    vm_of(env).handles.remove(gref as usize);
}

unsafe extern "system" fn delete_local_ref(env: *mut JNIEnv, obj: jobject) {
    vm_of(env).handles.release_locals(&[obj as usize]);
}

unsafe extern "system" fn is_same_object(env: *mut JNIEnv, a: jobject, b: jobject) -> jboolean {
    match (object_of(env, a), object_of(env, b)) {
        (Some(x), Some(y)) => object_eq(&x, &y) as jboolean,
        (None, None) => JNI_TRUE,
        _ => JNI_FALSE,
    }
}

unsafe extern "system" fn get_object_class(env: *mut JNIEnv, obj: jobject) -> jclass {
    let vm = vm_of(env);
    match object_of(env, obj).and_then(|o| o.class_name()) {
        Some(name) => {
            let mirror = vm.class_mirror(&name);
            vm.handles.to_token(&mirror) as jclass
        }
        None => null_mut(),
    }
}

unsafe extern "system" fn is_instance_of(env: *mut JNIEnv, obj: jobject, clazz: jclass) -> jboolean {
    let vm = vm_of(env);
    let target = match object_of(env, clazz).as_ref().and_then(|m| {
        m.mirror_target().map(|t| t.to_string())
    }) {
        Some(name) => name,
        None => return JNI_FALSE,
    };

    match object_of(env, obj).and_then(|o| o.class_name()) {
        Some(class) => vm.registry.is_assignable(&class, &target) as jboolean,
        None => JNI_FALSE,
    }
}

unsafe extern "system" fn new_string_utf(env: *mut JNIEnv, utf: *const c_char) -> jstring {
    let vm = vm_of(env);
    if utf.is_null() {
        return null_mut();
    }
    let text = CStr::from_ptr(utf).to_string_lossy().into_owned();
    let obj = vm.heap().make_string(&text);
    vm.handles.to_token(&obj) as jstring
}

unsafe extern "system" fn get_string_utf_length(env: *mut JNIEnv, str_: jstring) -> jsize {
    match object_of(env, str_) {
        Some(obj) => obj.as_str().map(|s| s.len()).unwrap_or(0) as jsize,
        None => 0,
    }
}

unsafe extern "system" fn get_string_length(env: *mut JNIEnv, str_: jstring) -> jsize {
    match object_of(env, str_) {
        Some(obj) => obj
            .as_str()
            .map(|s| s.encode_utf16().count())
            .unwrap_or(0) as jsize,
        None => 0,
    }
}

/// Returns a heap-allocated copy of the string's text; released by the
/// matching `ReleaseStringUTFChars`.
unsafe extern "system" fn get_string_utf_chars(
    env: *mut JNIEnv,
    str_: jstring,
    is_copy: *mut jboolean,
) -> *const c_char {
    if !is_copy.is_null() {
        *is_copy = JNI_TRUE;
    }

    let text = match object_of(env, str_) {
        Some(obj) => obj.as_str().map(|s| s.to_string()),
        None => None,
    };

    match text.and_then(|t| CString::new(t).ok()) {
        Some(owned) => owned.into_raw(),
        None => null_mut(),
    }
}

unsafe extern "system" fn release_string_utf_chars(
    _env: *mut JNIEnv,
    _str: jstring,
    chars: *const c_char,
) {
    if !chars.is_null() {
        drop(CString::from_raw(chars as *mut c_char));
    }
}

unsafe extern "system" fn get_array_length(env: *mut JNIEnv, array: jarray) -> jsize {
    match object_of(env, array) {
        Some(obj) => obj.as_array().map(|a| a.length()).unwrap_or(0) as jsize,
        None => 0,
    }
}

/// Binding actually happens through the symbol naming scheme, so this call
/// only acknowledges the request.
unsafe extern "system" fn register_natives(
    env: *mut JNIEnv,
    clazz: jclass,
    methods: *const JNINativeMethod,
    n_methods: jint,
) -> jint {
    let class_name = object_of(env, clazz)
        .as_ref()
        .and_then(|m| m.mirror_target().map(|t| t.to_string()))
        .unwrap_or_default();

    for at in 0..n_methods.max(0) as usize {
        let method = &*methods.add(at);
        let name = CStr::from_ptr(method.name).to_string_lossy();
        let sig = CStr::from_ptr(method.signature).to_string_lossy();
        debug!("RegisterNatives: {}.{}{} acknowledged", class_name, name, sig);
    }
    JNI_OK
}

unsafe extern "system" fn monitor_enter(env: *mut JNIEnv, obj: jobject) -> jint {
    match object_of(env, obj) {
        Some(target) => {
            target.monitor().enter();
            JNI_OK
        }
        None => JNI_ERR,
    }
}

unsafe extern "system" fn monitor_exit(env: *mut JNIEnv, obj: jobject) -> jint {
    match object_of(env, obj) {
        Some(target) => match target.monitor().exit() {
            Ok(()) => JNI_OK,
            Err(_) => JNI_ERR,
        },
        None => JNI_ERR,
    }
}

unsafe extern "system" fn fatal_error(env: *mut JNIEnv, msg: *const c_char) -> ! {
    let text = CStr::from_ptr(msg).to_string_lossy().into_owned();
    vm_of(env).write_err(&format!("fatal error from native code: {}\n", text));
    std::process::abort()
}

// Every entry below exists only to fail loudly when native code reaches for
// functionality the bridge does not provide.
macro_rules! jni_stubs {
    ($($name:ident($($arg:ty),*) -> $ret:ty;)+) => {
        $(
            unsafe extern "system" fn $name(_env: *mut JNIEnv $(, _: $arg)*) -> $ret {
                unimplemented!(concat!("JNIEnv::", stringify!($name), " is not implemented"))
            }
        )+
    };
}

jni_stubs! {
    DefineClass(*const c_char, jobject, *const jbyte, jsize) -> jclass;
    FromReflectedMethod(jobject) -> jmethodID;
    FromReflectedField(jobject) -> jfieldID;
    ToReflectedMethod(jclass, jmethodID, jboolean) -> jobject;
    GetSuperclass(jclass) -> jclass;
    IsAssignableFrom(jclass, jclass) -> jboolean;
    ToReflectedField(jclass, jfieldID, jboolean) -> jobject;
    PushLocalFrame(jint) -> jint;
    PopLocalFrame(jobject) -> jobject;
    NewLocalRef(jobject) -> jobject;
    EnsureLocalCapacity(jint) -> jint;
    AllocObject(jclass) -> jobject;
    NewObjectV(jclass, jmethodID, va_list) -> jobject;
    NewObjectA(jclass, jmethodID, *const jvalue) -> jobject;
    GetMethodID(jclass, *const c_char, *const c_char) -> jmethodID;
    CallObjectMethodV(jobject, jmethodID, va_list) -> jobject;
    CallObjectMethodA(jobject, jmethodID, *const jvalue) -> jobject;
    CallBooleanMethodV(jobject, jmethodID, va_list) -> jboolean;
    CallBooleanMethodA(jobject, jmethodID, *const jvalue) -> jboolean;
    CallByteMethodV(jobject, jmethodID, va_list) -> jbyte;
    CallByteMethodA(jobject, jmethodID, *const jvalue) -> jbyte;
    CallCharMethodV(jobject, jmethodID, va_list) -> jchar;
    CallCharMethodA(jobject, jmethodID, *const jvalue) -> jchar;
    CallShortMethodV(jobject, jmethodID, va_list) -> jshort;
    CallShortMethodA(jobject, jmethodID, *const jvalue) -> jshort;
    CallIntMethodV(jobject, jmethodID, va_list) -> jint;
    CallIntMethodA(jobject, jmethodID, *const jvalue) -> jint;
    CallLongMethodV(jobject, jmethodID, va_list) -> jlong;
    CallLongMethodA(jobject, jmethodID, *const jvalue) -> jlong;
    CallFloatMethodV(jobject, jmethodID, va_list) -> jfloat;
    CallFloatMethodA(jobject, jmethodID, *const jvalue) -> jfloat;
    CallDoubleMethodV(jobject, jmethodID, va_list) -> jdouble;
    CallDoubleMethodA(jobject, jmethodID, *const jvalue) -> jdouble;
    CallVoidMethodV(jobject, jmethodID, va_list) -> ();
    CallVoidMethodA(jobject, jmethodID, *const jvalue) -> ();
    CallNonvirtualObjectMethodV(jobject, jclass, jmethodID, va_list) -> jobject;
    CallNonvirtualObjectMethodA(jobject, jclass, jmethodID, *const jvalue) -> jobject;
    CallNonvirtualBooleanMethodV(jobject, jclass, jmethodID, va_list) -> jboolean;
    CallNonvirtualBooleanMethodA(jobject, jclass, jmethodID, *const jvalue) -> jboolean;
    CallNonvirtualByteMethodV(jobject, jclass, jmethodID, va_list) -> jbyte;
    CallNonvirtualByteMethodA(jobject, jclass, jmethodID, *const jvalue) -> jbyte;
    CallNonvirtualCharMethodV(jobject, jclass, jmethodID, va_list) -> jchar;
    CallNonvirtualCharMethodA(jobject, jclass, jmethodID, *const jvalue) -> jchar;
    CallNonvirtualShortMethodV(jobject, jclass, jmethodID, va_list) -> jshort;
    CallNonvirtualShortMethodA(jobject, jclass, jmethodID, *const jvalue) -> jshort;
    CallNonvirtualIntMethodV(jobject, jclass, jmethodID, va_list) -> jint;
    CallNonvirtualIntMethodA(jobject, jclass, jmethodID, *const jvalue) -> jint;
    CallNonvirtualLongMethodV(jobject, jclass, jmethodID, va_list) -> jlong;
    CallNonvirtualLongMethodA(jobject, jclass, jmethodID, *const jvalue) -> jlong;
    CallNonvirtualFloatMethodV(jobject, jclass, jmethodID, va_list) -> jfloat;
    CallNonvirtualFloatMethodA(jobject, jclass, jmethodID, *const jvalue) -> jfloat;
    CallNonvirtualDoubleMethodV(jobject, jclass, jmethodID, va_list) -> jdouble;
    CallNonvirtualDoubleMethodA(jobject, jclass, jmethodID, *const jvalue) -> jdouble;
    CallNonvirtualVoidMethodV(jobject, jclass, jmethodID, va_list) -> ();
    CallNonvirtualVoidMethodA(jobject, jclass, jmethodID, *const jvalue) -> ();
    GetFieldID(jclass, *const c_char, *const c_char) -> jfieldID;
    GetObjectField(jobject, jfieldID) -> jobject;
    GetBooleanField(jobject, jfieldID) -> jboolean;
    GetByteField(jobject, jfieldID) -> jbyte;
    GetCharField(jobject, jfieldID) -> jchar;
    GetShortField(jobject, jfieldID) -> jshort;
    GetIntField(jobject, jfieldID) -> jint;
    GetLongField(jobject, jfieldID) -> jlong;
    GetFloatField(jobject, jfieldID) -> jfloat;
    GetDoubleField(jobject, jfieldID) -> jdouble;
    SetObjectField(jobject, jfieldID, jobject) -> ();
    SetBooleanField(jobject, jfieldID, jboolean) -> ();
    SetByteField(jobject, jfieldID, jbyte) -> ();
    SetCharField(jobject, jfieldID, jchar) -> ();
    SetShortField(jobject, jfieldID, jshort) -> ();
    SetIntField(jobject, jfieldID, jint) -> ();
    SetLongField(jobject, jfieldID, jlong) -> ();
    SetFloatField(jobject, jfieldID, jfloat) -> ();
    SetDoubleField(jobject, jfieldID, jdouble) -> ();
    GetStaticMethodID(jclass, *const c_char, *const c_char) -> jmethodID;
    CallStaticObjectMethodV(jclass, jmethodID, va_list) -> jobject;
    CallStaticObjectMethodA(jclass, jmethodID, *const jvalue) -> jobject;
    CallStaticBooleanMethodV(jclass, jmethodID, va_list) -> jboolean;
    CallStaticBooleanMethodA(jclass, jmethodID, *const jvalue) -> jboolean;
    CallStaticByteMethodV(jclass, jmethodID, va_list) -> jbyte;
    CallStaticByteMethodA(jclass, jmethodID, *const jvalue) -> jbyte;
    CallStaticCharMethodV(jclass, jmethodID, va_list) -> jchar;
    CallStaticCharMethodA(jclass, jmethodID, *const jvalue) -> jchar;
    CallStaticShortMethodV(jclass, jmethodID, va_list) -> jshort;
    CallStaticShortMethodA(jclass, jmethodID, *const jvalue) -> jshort;
    CallStaticIntMethodV(jclass, jmethodID, va_list) -> jint;
    CallStaticIntMethodA(jclass, jmethodID, *const jvalue) -> jint;
    CallStaticLongMethodV(jclass, jmethodID, va_list) -> jlong;
    CallStaticLongMethodA(jclass, jmethodID, *const jvalue) -> jlong;
    CallStaticFloatMethodV(jclass, jmethodID, va_list) -> jfloat;
    CallStaticFloatMethodA(jclass, jmethodID, *const jvalue) -> jfloat;
    CallStaticDoubleMethodV(jclass, jmethodID, va_list) -> jdouble;
    CallStaticDoubleMethodA(jclass, jmethodID, *const jvalue) -> jdouble;
    CallStaticVoidMethodV(jclass, jmethodID, va_list) -> ();
    CallStaticVoidMethodA(jclass, jmethodID, *const jvalue) -> ();
    GetStaticFieldID(jclass, *const c_char, *const c_char) -> jfieldID;
    GetStaticObjectField(jclass, jfieldID) -> jobject;
    GetStaticBooleanField(jclass, jfieldID) -> jboolean;
    GetStaticByteField(jclass, jfieldID) -> jbyte;
    GetStaticCharField(jclass, jfieldID) -> jchar;
    GetStaticShortField(jclass, jfieldID) -> jshort;
    GetStaticIntField(jclass, jfieldID) -> jint;
    GetStaticLongField(jclass, jfieldID) -> jlong;
    GetStaticFloatField(jclass, jfieldID) -> jfloat;
    GetStaticDoubleField(jclass, jfieldID) -> jdouble;
    SetStaticObjectField(jclass, jfieldID, jobject) -> ();
    SetStaticBooleanField(jclass, jfieldID, jboolean) -> ();
    SetStaticByteField(jclass, jfieldID, jbyte) -> ();
    SetStaticCharField(jclass, jfieldID, jchar) -> ();
    SetStaticShortField(jclass, jfieldID, jshort) -> ();
    SetStaticIntField(jclass, jfieldID, jint) -> ();
    SetStaticLongField(jclass, jfieldID, jlong) -> ();
    SetStaticFloatField(jclass, jfieldID, jfloat) -> ();
    SetStaticDoubleField(jclass, jfieldID, jdouble) -> ();
    NewString(*const jchar, jsize) -> jstring;
    GetStringChars(jstring, *mut jboolean) -> *const jchar;
    ReleaseStringChars(jstring, *const jchar) -> ();
    NewObjectArray(jsize, jclass, jobject) -> jobjectArray;
    GetObjectArrayElement(jobjectArray, jsize) -> jobject;
    SetObjectArrayElement(jobjectArray, jsize, jobject) -> ();
    NewBooleanArray(jsize) -> jobject;
    NewByteArray(jsize) -> jobject;
    NewCharArray(jsize) -> jobject;
    NewShortArray(jsize) -> jobject;
    NewIntArray(jsize) -> jobject;
    NewLongArray(jsize) -> jobject;
    NewFloatArray(jsize) -> jobject;
    NewDoubleArray(jsize) -> jobject;
    GetBooleanArrayElements(jobject, *mut jboolean) -> *mut jboolean;
    GetByteArrayElements(jobject, *mut jboolean) -> *mut jbyte;
    GetCharArrayElements(jobject, *mut jboolean) -> *mut jchar;
    GetShortArrayElements(jobject, *mut jboolean) -> *mut jshort;
    GetIntArrayElements(jobject, *mut jboolean) -> *mut jint;
    GetLongArrayElements(jobject, *mut jboolean) -> *mut jlong;
    GetFloatArrayElements(jobject, *mut jboolean) -> *mut jfloat;
    GetDoubleArrayElements(jobject, *mut jboolean) -> *mut jdouble;
    ReleaseBooleanArrayElements(jobject, *mut jboolean, jint) -> ();
    ReleaseByteArrayElements(jobject, *mut jbyte, jint) -> ();
    ReleaseCharArrayElements(jobject, *mut jchar, jint) -> ();
    ReleaseShortArrayElements(jobject, *mut jshort, jint) -> ();
    ReleaseIntArrayElements(jobject, *mut jint, jint) -> ();
    ReleaseLongArrayElements(jobject, *mut jlong, jint) -> ();
    ReleaseFloatArrayElements(jobject, *mut jfloat, jint) -> ();
    ReleaseDoubleArrayElements(jobject, *mut jdouble, jint) -> ();
    GetBooleanArrayRegion(jobject, jsize, jsize, *mut jboolean) -> ();
    GetByteArrayRegion(jobject, jsize, jsize, *mut jbyte) -> ();
    GetCharArrayRegion(jobject, jsize, jsize, *mut jchar) -> ();
    GetShortArrayRegion(jobject, jsize, jsize, *mut jshort) -> ();
    GetIntArrayRegion(jobject, jsize, jsize, *mut jint) -> ();
    GetLongArrayRegion(jobject, jsize, jsize, *mut jlong) -> ();
    GetFloatArrayRegion(jobject, jsize, jsize, *mut jfloat) -> ();
    GetDoubleArrayRegion(jobject, jsize, jsize, *mut jdouble) -> ();
    SetBooleanArrayRegion(jobject, jsize, jsize, *const jboolean) -> ();
    SetByteArrayRegion(jobject, jsize, jsize, *const jbyte) -> ();
    SetCharArrayRegion(jobject, jsize, jsize, *const jchar) -> ();
    SetShortArrayRegion(jobject, jsize, jsize, *const jshort) -> ();
    SetIntArrayRegion(jobject, jsize, jsize, *const jint) -> ();
    SetLongArrayRegion(jobject, jsize, jsize, *const jlong) -> ();
    SetFloatArrayRegion(jobject, jsize, jsize, *const jfloat) -> ();
    SetDoubleArrayRegion(jobject, jsize, jsize, *const jdouble) -> ();
    UnregisterNatives(jclass) -> jint;
    GetJavaVM(*mut *mut JavaVM) -> jint;
    GetStringRegion(jstring, jsize, jsize, *mut jchar) -> ();
    GetStringUTFRegion(jstring, jsize, jsize, *mut c_char) -> ();
    GetPrimitiveArrayCritical(jarray, *mut jboolean) -> *mut c_void;
    ReleasePrimitiveArrayCritical(jarray, *mut c_void, jint) -> ();
    GetStringCritical(jstring, *mut jboolean) -> *const jchar;
    ReleaseStringCritical(jstring, *const jchar) -> ();
    NewWeakGlobalRef(jobject) -> jweak;
    DeleteWeakGlobalRef(jweak) -> ();
    NewDirectByteBuffer(*mut c_void, jlong) -> jobject;
    GetDirectBufferAddress(jobject) -> *mut c_void;
    GetDirectBufferCapacity(jobject) -> jlong;
    GetObjectRefType(jobject) -> jobjectRefType;
}

/// Assemble the environment function table. `reserved0` carries the VM
/// context pointer; the table only lives for the duration of one native
/// call, matching the lifetime of the borrowed VM handle.
pub fn build_interface(vm: &Arc<Vm>) -> JNINativeInterface_ {
    JNINativeInterface_ {
        reserved0: vm as *const Arc<Vm> as *mut c_void,
        reserved1: null_mut(),
        reserved2: null_mut(),
        reserved3: null_mut(),
        GetVersion: Some(get_version),
        DefineClass: Some(DefineClass),
        FindClass: Some(find_class),
        FromReflectedMethod: Some(FromReflectedMethod),
        FromReflectedField: Some(FromReflectedField),
        ToReflectedMethod: Some(ToReflectedMethod),
        GetSuperclass: Some(GetSuperclass),
        IsAssignableFrom: Some(IsAssignableFrom),
        ToReflectedField: Some(ToReflectedField),
        Throw: Some(throw),
        ThrowNew: Some(throw_new),
        ExceptionOccurred: Some(exception_occurred),
        ExceptionDescribe: Some(exception_describe),
        ExceptionClear: Some(exception_clear),
        FatalError: Some(fatal_error),
        PushLocalFrame: Some(PushLocalFrame),
        PopLocalFrame: Some(PopLocalFrame),
        NewGlobalRef: Some(new_global_ref),
        DeleteGlobalRef: Some(delete_global_ref),
        DeleteLocalRef: Some(delete_local_ref),
        IsSameObject: Some(is_same_object),
        NewLocalRef: Some(NewLocalRef),
        EnsureLocalCapacity: Some(EnsureLocalCapacity),
        AllocObject: Some(AllocObject),
        NewObject: None,
        NewObjectV: Some(NewObjectV),
        NewObjectA: Some(NewObjectA),
        GetObjectClass: Some(get_object_class),
        IsInstanceOf: Some(is_instance_of),
        GetMethodID: Some(GetMethodID),
        CallObjectMethod: None,
        CallObjectMethodV: Some(CallObjectMethodV),
        CallObjectMethodA: Some(CallObjectMethodA),
        CallBooleanMethod: None,
        CallBooleanMethodV: Some(CallBooleanMethodV),
        CallBooleanMethodA: Some(CallBooleanMethodA),
        CallByteMethod: None,
        CallByteMethodV: Some(CallByteMethodV),
        CallByteMethodA: Some(CallByteMethodA),
        CallCharMethod: None,
        CallCharMethodV: Some(CallCharMethodV),
        CallCharMethodA: Some(CallCharMethodA),
        CallShortMethod: None,
        CallShortMethodV: Some(CallShortMethodV),
        CallShortMethodA: Some(CallShortMethodA),
        CallIntMethod: None,
        CallIntMethodV: Some(CallIntMethodV),
        CallIntMethodA: Some(CallIntMethodA),
        CallLongMethod: None,
        CallLongMethodV: Some(CallLongMethodV),
        CallLongMethodA: Some(CallLongMethodA),
        CallFloatMethod: None,
        CallFloatMethodV: Some(CallFloatMethodV),
        CallFloatMethodA: Some(CallFloatMethodA),
        CallDoubleMethod: None,
        CallDoubleMethodV: Some(CallDoubleMethodV),
        CallDoubleMethodA: Some(CallDoubleMethodA),
        CallVoidMethod: None,
        CallVoidMethodV: Some(CallVoidMethodV),
        CallVoidMethodA: Some(CallVoidMethodA),
        CallNonvirtualObjectMethod: None,
        CallNonvirtualObjectMethodV: Some(CallNonvirtualObjectMethodV),
        CallNonvirtualObjectMethodA: Some(CallNonvirtualObjectMethodA),
        CallNonvirtualBooleanMethod: None,
        CallNonvirtualBooleanMethodV: Some(CallNonvirtualBooleanMethodV),
        CallNonvirtualBooleanMethodA: Some(CallNonvirtualBooleanMethodA),
        CallNonvirtualByteMethod: None,
        CallNonvirtualByteMethodV: Some(CallNonvirtualByteMethodV),
        CallNonvirtualByteMethodA: Some(CallNonvirtualByteMethodA),
        CallNonvirtualCharMethod: None,
        CallNonvirtualCharMethodV: Some(CallNonvirtualCharMethodV),
        CallNonvirtualCharMethodA: Some(CallNonvirtualCharMethodA),
        CallNonvirtualShortMethod: None,
        CallNonvirtualShortMethodV: Some(CallNonvirtualShortMethodV),
        CallNonvirtualShortMethodA: Some(CallNonvirtualShortMethodA),
        CallNonvirtualIntMethod: None,
        CallNonvirtualIntMethodV: Some(CallNonvirtualIntMethodV),
        CallNonvirtualIntMethodA: Some(CallNonvirtualIntMethodA),
        CallNonvirtualLongMethod: None,
        CallNonvirtualLongMethodV: Some(CallNonvirtualLongMethodV),
        CallNonvirtualLongMethodA: Some(CallNonvirtualLongMethodA),
        CallNonvirtualFloatMethod: None,
        CallNonvirtualFloatMethodV: Some(CallNonvirtualFloatMethodV),
        CallNonvirtualFloatMethodA: Some(CallNonvirtualFloatMethodA),
        CallNonvirtualDoubleMethod: None,
        CallNonvirtualDoubleMethodV: Some(CallNonvirtualDoubleMethodV),
        CallNonvirtualDoubleMethodA: Some(CallNonvirtualDoubleMethodA),
        CallNonvirtualVoidMethod: None,
        CallNonvirtualVoidMethodV: Some(CallNonvirtualVoidMethodV),
        CallNonvirtualVoidMethodA: Some(CallNonvirtualVoidMethodA),
        GetFieldID: Some(GetFieldID),
        GetObjectField: Some(GetObjectField),
        GetBooleanField: Some(GetBooleanField),
        GetByteField: Some(GetByteField),
        GetCharField: Some(GetCharField),
        GetShortField: Some(GetShortField),
        GetIntField: Some(GetIntField),
        GetLongField: Some(GetLongField),
        GetFloatField: Some(GetFloatField),
        GetDoubleField: Some(GetDoubleField),
        SetObjectField: Some(SetObjectField),
        SetBooleanField: Some(SetBooleanField),
        SetByteField: Some(SetByteField),
        SetCharField: Some(SetCharField),
        SetShortField: Some(SetShortField),
        SetIntField: Some(SetIntField),
        SetLongField: Some(SetLongField),
        SetFloatField: Some(SetFloatField),
        SetDoubleField: Some(SetDoubleField),
        GetStaticMethodID: Some(GetStaticMethodID),
        CallStaticObjectMethod: None,
        CallStaticObjectMethodV: Some(CallStaticObjectMethodV),
        CallStaticObjectMethodA: Some(CallStaticObjectMethodA),
        CallStaticBooleanMethod: None,
        CallStaticBooleanMethodV: Some(CallStaticBooleanMethodV),
        CallStaticBooleanMethodA: Some(CallStaticBooleanMethodA),
        CallStaticByteMethod: None,
        CallStaticByteMethodV: Some(CallStaticByteMethodV),
        CallStaticByteMethodA: Some(CallStaticByteMethodA),
        CallStaticCharMethod: None,
        CallStaticCharMethodV: Some(CallStaticCharMethodV),
        CallStaticCharMethodA: Some(CallStaticCharMethodA),
        CallStaticShortMethod: None,
        CallStaticShortMethodV: Some(CallStaticShortMethodV),
        CallStaticShortMethodA: Some(CallStaticShortMethodA),
        CallStaticIntMethod: None,
        CallStaticIntMethodV: Some(CallStaticIntMethodV),
        CallStaticIntMethodA: Some(CallStaticIntMethodA),
        CallStaticLongMethod: None,
        CallStaticLongMethodV: Some(CallStaticLongMethodV),
        CallStaticLongMethodA: Some(CallStaticLongMethodA),
        CallStaticFloatMethod: None,
        CallStaticFloatMethodV: Some(CallStaticFloatMethodV),
        CallStaticFloatMethodA: Some(CallStaticFloatMethodA),
        CallStaticDoubleMethod: None,
        CallStaticDoubleMethodV: Some(CallStaticDoubleMethodV),
        CallStaticDoubleMethodA: Some(CallStaticDoubleMethodA),
        CallStaticVoidMethod: None,
        CallStaticVoidMethodV: Some(CallStaticVoidMethodV),
        CallStaticVoidMethodA: Some(CallStaticVoidMethodA),
        GetStaticFieldID: Some(GetStaticFieldID),
        GetStaticObjectField: Some(GetStaticObjectField),
        GetStaticBooleanField: Some(GetStaticBooleanField),
        GetStaticByteField: Some(GetStaticByteField),
        GetStaticCharField: Some(GetStaticCharField),
        GetStaticShortField: Some(GetStaticShortField),
        GetStaticIntField: Some(GetStaticIntField),
        GetStaticLongField: Some(GetStaticLongField),
        GetStaticFloatField: Some(GetStaticFloatField),
        GetStaticDoubleField: Some(GetStaticDoubleField),
        SetStaticObjectField: Some(SetStaticObjectField),
        SetStaticBooleanField: Some(SetStaticBooleanField),
        SetStaticByteField: Some(SetStaticByteField),
        SetStaticCharField: Some(SetStaticCharField),
        SetStaticShortField: Some(SetStaticShortField),
        SetStaticIntField: Some(SetStaticIntField),
        SetStaticLongField: Some(SetStaticLongField),
        SetStaticFloatField: Some(SetStaticFloatField),
        SetStaticDoubleField: Some(SetStaticDoubleField),
        NewString: Some(NewString),
        GetStringLength: Some(get_string_length),
        GetStringChars: Some(GetStringChars),
        ReleaseStringChars: Some(ReleaseStringChars),
        NewStringUTF: Some(new_string_utf),
        GetStringUTFLength: Some(get_string_utf_length),
        GetStringUTFChars: Some(get_string_utf_chars),
        ReleaseStringUTFChars: Some(release_string_utf_chars),
        GetArrayLength: Some(get_array_length),
        NewObjectArray: Some(NewObjectArray),
        GetObjectArrayElement: Some(GetObjectArrayElement),
        SetObjectArrayElement: Some(SetObjectArrayElement),
        NewBooleanArray: Some(NewBooleanArray),
        NewByteArray: Some(NewByteArray),
        NewCharArray: Some(NewCharArray),
        NewShortArray: Some(NewShortArray),
        NewIntArray: Some(NewIntArray),
        NewLongArray: Some(NewLongArray),
        NewFloatArray: Some(NewFloatArray),
        NewDoubleArray: Some(NewDoubleArray),
        GetBooleanArrayElements: Some(GetBooleanArrayElements),
        GetByteArrayElements: Some(GetByteArrayElements),
        GetCharArrayElements: Some(GetCharArrayElements),
        GetShortArrayElements: Some(GetShortArrayElements),
        GetIntArrayElements: Some(GetIntArrayElements),
        GetLongArrayElements: Some(GetLongArrayElements),
        GetFloatArrayElements: Some(GetFloatArrayElements),
        GetDoubleArrayElements: Some(GetDoubleArrayElements),
        ReleaseBooleanArrayElements: Some(ReleaseBooleanArrayElements),
        ReleaseByteArrayElements: Some(ReleaseByteArrayElements),
        ReleaseCharArrayElements: Some(ReleaseCharArrayElements),
        ReleaseShortArrayElements: Some(ReleaseShortArrayElements),
        ReleaseIntArrayElements: Some(ReleaseIntArrayElements),
        ReleaseLongArrayElements: Some(ReleaseLongArrayElements),
        ReleaseFloatArrayElements: Some(ReleaseFloatArrayElements),
        ReleaseDoubleArrayElements: Some(ReleaseDoubleArrayElements),
        GetBooleanArrayRegion: Some(GetBooleanArrayRegion),
        GetByteArrayRegion: Some(GetByteArrayRegion),
        GetCharArrayRegion: Some(GetCharArrayRegion),
        GetShortArrayRegion: Some(GetShortArrayRegion),
        GetIntArrayRegion: Some(GetIntArrayRegion),
        GetLongArrayRegion: Some(GetLongArrayRegion),
        GetFloatArrayRegion: Some(GetFloatArrayRegion),
        GetDoubleArrayRegion: Some(GetDoubleArrayRegion),
        SetBooleanArrayRegion: Some(SetBooleanArrayRegion),
        SetByteArrayRegion: Some(SetByteArrayRegion),
        SetCharArrayRegion: Some(SetCharArrayRegion),
        SetShortArrayRegion: Some(SetShortArrayRegion),
        SetIntArrayRegion: Some(SetIntArrayRegion),
        SetLongArrayRegion: Some(SetLongArrayRegion),
        SetFloatArrayRegion: Some(SetFloatArrayRegion),
        SetDoubleArrayRegion: Some(SetDoubleArrayRegion),
        RegisterNatives: Some(register_natives),
        UnregisterNatives: Some(UnregisterNatives),
        MonitorEnter: Some(monitor_enter),
        MonitorExit: Some(monitor_exit),
        GetJavaVM: Some(GetJavaVM),
        GetStringRegion: Some(GetStringRegion),
        GetStringUTFRegion: Some(GetStringUTFRegion),
        GetPrimitiveArrayCritical: Some(GetPrimitiveArrayCritical),
        ReleasePrimitiveArrayCritical: Some(ReleasePrimitiveArrayCritical),
        GetStringCritical: Some(GetStringCritical),
        ReleaseStringCritical: Some(ReleaseStringCritical),
        NewWeakGlobalRef: Some(NewWeakGlobalRef),
        DeleteWeakGlobalRef: Some(DeleteWeakGlobalRef),
        ExceptionCheck: Some(exception_check),
        NewDirectByteBuffer: Some(NewDirectByteBuffer),
        GetDirectBufferAddress: Some(GetDirectBufferAddress),
        GetDirectBufferCapacity: Some(GetDirectBufferCapacity),
        GetObjectRefType: Some(GetObjectRefType),
    }
}
