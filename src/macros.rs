#![deny(meta_variable_misuse)]

macro_rules! see_jvm_spec {
    ($chapter:literal $(, $section:literal)*) => {
        concat!(
            "See the [JVM Specification §",
            stringify!($chapter) $(, ".", stringify!($section))*,
            "](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-",
            stringify!($chapter),
            ".html) for more information."
        )
    };
}

pub(crate) use see_jvm_spec;
